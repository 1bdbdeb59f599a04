//! `.env` reader. Values are collected into a local map; the process
//! environment is never modified.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvFile {
    vars: HashMap<String, String>,
    rejected: Vec<String>,
}

impl EnvFile {
    pub fn load(path: &Path) -> Result<Self, dotenvy::Error> {
        Ok(Self::collect(dotenvy::from_path_iter(path)?))
    }

    /// Parse dotenv syntax (`KEY=VALUE`, comments, quotes, `export `).
    /// Malformed lines are skipped and reported through [`EnvFile::rejected`].
    pub fn parse(contents: &str) -> Self {
        Self::collect(dotenvy::from_read_iter(contents.as_bytes()))
    }

    fn collect<R: Read>(iter: dotenvy::Iter<R>) -> Self {
        let mut file = Self::default();
        for item in iter {
            match item {
                Ok((key, value)) => {
                    file.vars.insert(key, value);
                }
                Err(e) => file.rejected.push(e.to_string()),
            }
        }
        file
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn rejected(&self) -> &[String] {
        &self.rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_parse_basic_lines() {
        let env = EnvFile::parse(
            "# Joplin settings\n\
             JOPLIN_TOKEN=abc123\n\
             \n\
             export JOPLIN_PORT=41185\n",
        );
        assert_eq!(env.get("JOPLIN_TOKEN"), Some("abc123"));
        assert_eq!(env.get("JOPLIN_PORT"), Some("41185"));
        assert_eq!(env.get("MISSING"), None);
        assert!(env.rejected().is_empty());
    }

    #[test]
    fn test_quoted_value_with_trailing_comment() {
        let env = EnvFile::parse("JOPLIN_TOKEN=\"abc123\" # from Web Clipper\n");
        assert_eq!(env.get("JOPLIN_TOKEN"), Some("abc123"));

        let env = EnvFile::parse("JOPLIN_HOST='10.0.0.5' # desktop\n");
        assert_eq!(env.get("JOPLIN_HOST"), Some("10.0.0.5"));
    }

    #[test]
    fn test_quotes_and_comments() {
        let env = EnvFile::parse("A=\"has # hash\"\nB='single'\nC=plain # trailing\nD=x=y\nE=\"\"\n");
        assert_eq!(env.get("A"), Some("has # hash"));
        assert_eq!(env.get("B"), Some("single"));
        assert_eq!(env.get("C"), Some("plain"));
        assert_eq!(env.get("D"), Some("x=y"));
        assert_eq!(env.get("E"), Some(""));
    }

    #[test]
    fn test_malformed_line_is_reported_and_skipped() {
        let env = EnvFile::parse("GOOD=1\nnot a pair\nALSO_GOOD=2\n");
        assert_eq!(env.get("GOOD"), Some("1"));
        assert_eq!(env.get("ALSO_GOOD"), Some("2"));
        assert_eq!(env.rejected().len(), 1);
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "JOPLIN_HOST=192.168.1.20\n").unwrap();

        let env = EnvFile::load(&path).unwrap();
        assert_eq!(env.get("JOPLIN_HOST"), Some("192.168.1.20"));
        assert!(EnvFile::load(&dir.path().join("absent.env")).is_err());
    }
}
