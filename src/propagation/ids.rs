//! Identifier generation for traces, spans and requests.

use rand::Rng;
use uuid::Uuid;

/// Source of fresh identifiers.
///
/// Trace and span ids must be 16 lowercase hex characters; that format is
/// what the sidecars and the trace collector parse.
pub trait IdGenerator: Send + Sync {
    fn trace_id(&self) -> String;
    fn span_id(&self) -> String;
    fn request_id(&self) -> String;
}

/// Thread-safe random generator backed by the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn trace_id(&self) -> String {
        random_hex_id()
    }

    fn span_id(&self) -> String {
        random_hex_id()
    }

    fn request_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// 64 random bits as 16 lowercase hex characters. Never all zeros.
pub fn random_hex_id() -> String {
    let mut rng = rand::thread_rng();
    loop {
        let id: u64 = rng.gen();
        if id != 0 {
            return format!("{:016x}", id);
        }
    }
}

/// True if `s` is exactly 16 lowercase hex characters.
pub fn is_hex_id(s: &str) -> bool {
    s.len() == 16 && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn hex_ids_have_wire_format() {
        for _ in 0..1_000 {
            let id = random_hex_id();
            assert!(is_hex_id(&id), "bad id {id}");
        }
    }

    #[test]
    fn hex_ids_do_not_repeat() {
        let ids: HashSet<String> = (0..10_000).map(|_| random_hex_id()).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn request_ids_are_unique() {
        let ids = RandomIdGenerator;
        assert_ne!(ids.request_id(), ids.request_id());
    }

    #[test]
    fn is_hex_id_rejects_uppercase_and_length() {
        assert!(!is_hex_id("ABCDEF0123456789"));
        assert!(!is_hex_id("abc"));
        assert!(is_hex_id("0123456789abcdef"));
    }
}
