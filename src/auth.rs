/// A GitLab personal access token.
///
/// Wrapped so the secret never leaks through `Debug` output or logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Token(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_debug_is_redacted() {
        let token = Token::from("glpat-super-secret");
        assert_eq!(format!("{token:?}"), "Token(***)");
    }

    #[test]
    fn test_token_round_trip() {
        let token = Token::from("glpat-abc".to_string());
        assert_eq!(token.as_str(), "glpat-abc");
    }
}
