use rand::Rng;
use rand::distr::Alphanumeric;

pub(crate) const ELEVATED_PASSWORD_LEN: usize = 20;

/// Fresh alphanumeric password for the elevated login. Never persisted.
pub(crate) fn generate_password(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passwords_are_alphanumeric_and_fresh() {
        let a = generate_password(ELEVATED_PASSWORD_LEN);
        let b = generate_password(ELEVATED_PASSWORD_LEN);
        assert_eq!(a.len(), ELEVATED_PASSWORD_LEN);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }
}
