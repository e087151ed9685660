use std::str::FromStr;

use crate::error::Error;

use super::error::TypeError;

pub type QueryPairs = Vec<(String, String)>;

/// Query string parameters, keeping repeated keys (`?tags=a&tags=b`).
#[derive(Debug, Clone, Default)]
pub struct Form {
    inner: QueryPairs,
}

impl Form {
    pub fn from_data(data: QueryPairs) -> Self {
        Self { inner: data }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.inner
            .iter()
            .filter(|(k, v)| k == key && !v.is_empty())
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn get_number<T>(&self, key: &str) -> Result<Option<T>, Error>
    where
        T: FromStr,
    {
        match self.get_str(key) {
            Some(value) if !value.is_empty() => value
                .parse()
                .map(Some)
                .map_err(|_e| TypeError::new(&format!("Invalid number for '{key}'")).into()),
            _ => Ok(None),
        }
    }

    pub fn get_numbers<T>(&self, key: &str) -> Result<Vec<T>, Error>
    where
        T: FromStr,
    {
        self.get_all(key)
            .into_iter()
            .map(|value| -> Result<T, Error> {
                value
                    .parse()
                    .map_err(|_e| TypeError::new(&format!("Invalid number for '{key}'")).into())
            })
            .collect()
    }

    /// Boolean filter flag: `1`/`true` and `0`/`false`; absent means no filter.
    pub fn get_flag(&self, key: &str) -> Result<Option<bool>, Error> {
        match self.get_str(key) {
            None | Some("") => Ok(None),
            Some("1") | Some("true") | Some("True") => Ok(Some(true)),
            Some("0") | Some("false") | Some("False") => Ok(Some(false)),
            Some(_) => Err(TypeError::new(&format!("Invalid flag for '{key}'")).into()),
        }
    }

    /// Re-encodes every pair except `skip`, used to build pagination links.
    pub fn encode_without(&self, skip: &str) -> Vec<(String, String)> {
        self.inner
            .iter()
            .filter(|(k, _)| k != skip)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> Form {
        Form::from_data(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn repeated_keys_are_kept_in_order() {
        let form = form(&[("tags", "breakfast"), ("page", "2"), ("tags", "lunch")]);
        assert_eq!(form.get_all("tags"), vec!["breakfast", "lunch"]);
        assert_eq!(form.get_str("tags"), Some("breakfast"));
    }

    #[test]
    fn numbers_parse_or_fail_with_400() {
        let form = form(&[("page", "3"), ("limit", "ten"), ("author", "1"), ("author", "7")]);
        assert_eq!(form.get_number::<i64>("page").unwrap(), Some(3));
        assert_eq!(form.get_number::<i64>("missing").unwrap(), None);
        assert_eq!(form.get_number::<i64>("limit").unwrap_err().code, 400);
        assert_eq!(form.get_numbers::<i32>("author").unwrap(), vec![1, 7]);
    }

    #[test]
    fn flags_accept_digits_and_words() {
        let form = form(&[("is_favorited", "1"), ("is_in_shopping_cart", "false"), ("x", "maybe")]);
        assert_eq!(form.get_flag("is_favorited").unwrap(), Some(true));
        assert_eq!(form.get_flag("is_in_shopping_cart").unwrap(), Some(false));
        assert_eq!(form.get_flag("absent").unwrap(), None);
        assert!(form.get_flag("x").is_err());
    }

    #[test]
    fn encode_without_drops_only_the_key() {
        let form = form(&[("page", "2"), ("tags", "a"), ("limit", "3")]);
        assert_eq!(
            form.encode_without("page"),
            vec![
                ("tags".to_string(), "a".to_string()),
                ("limit".to_string(), "3".to_string())
            ]
        );
    }
}
