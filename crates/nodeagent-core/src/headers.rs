//! Request metadata carrying the caller's credentials.

/// Header holding the caller's user name.
pub const USERNAME_HEADER: &str = "Username";

/// Header holding the caller's password.
pub const PASSWORD_HEADER: &str = "Password";

/// Case-insensitive, multi-valued header list.
///
/// Lookups return the first value recorded under a name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestHeaders {
    entries: Vec<(String, String)>,
}

impl RequestHeaders {
    /// Creates an empty header list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Headers carrying the given credentials.
    pub fn with_credentials(username: &str, password: &str) -> Self {
        let mut headers = Self::new();
        headers.append(USERNAME_HEADER, username);
        headers.append(PASSWORD_HEADER, password);
        headers
    }

    /// Adds a value, keeping any earlier values for the same name.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// First value recorded under `name`, compared case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values recorded under `name`.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The `Username` header.
    pub fn username(&self) -> Option<&str> {
        self.get(USERNAME_HEADER)
    }

    /// The `Password` header.
    pub fn password(&self) -> Option<&str> {
        self.get(PASSWORD_HEADER)
    }

    /// Number of recorded values.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no headers are recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RequestHeaders {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
