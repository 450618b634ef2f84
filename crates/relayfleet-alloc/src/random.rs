//! Random identifier generation from fixed alphabets

use rand::Rng;

/// Alphabet a generated identifier draws from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alphabet {
    /// Lowercase letters only; safe as a DNS label
    Letters,
    /// Mixed-case letters and digits; used for credentials
    Alphanumeric,
}

impl Alphabet {
    fn chars(self) -> &'static [u8] {
        match self {
            Alphabet::Letters => b"abcdefghijklmnopqrstuvwxyz",
            Alphabet::Alphanumeric => {
                b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789"
            }
        }
    }
}

/// Generate a random string of `len` characters from `alphabet`
pub fn random_string(len: usize, alphabet: Alphabet) -> String {
    let chars = alphabet.chars();
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| chars[rng.gen_range(0..chars.len())] as char)
        .collect()
}
