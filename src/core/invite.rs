use rand::Rng;

pub const INVITE_CODE_LEN: usize = 6;
const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generate a random invite code from `A-Z0-9`
pub fn generate_invite_code() -> String {
    let mut rng = rand::thread_rng();
    (0..INVITE_CODE_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Normalize user input: trim surrounding whitespace and uppercase
pub fn normalize_invite_code(input: &str) -> String {
    input.trim().to_ascii_uppercase()
}

pub fn is_valid_invite_code(code: &str) -> bool {
    code.len() == INVITE_CODE_LEN && code.bytes().all(|b| ALPHABET.contains(&b))
}
