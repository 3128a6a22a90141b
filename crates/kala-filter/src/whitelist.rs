use bson::{Bson, Document};
use serde::{Deserialize, Serialize};

/// Ordered, de-duplicated set of field names a client may touch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Whitelist {
    fields: Vec<String>,
}

impl Whitelist {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for field in fields {
            let field = field.as_ref().trim();
            if !field.is_empty() && !out.iter().any(|f| f == field) {
                out.push(field.to_string());
            }
        }
        Self { fields: out }
    }

    /// Parse a comma separated list, e.g. `name,age,address`.
    pub fn parse(csv: &str) -> Self {
        Self::new(csv.split(','))
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// An inclusion projection selecting exactly the whitelisted fields.
    pub fn projection(&self) -> Document {
        self.fields
            .iter()
            .map(|f| (f.clone(), Bson::Int32(1)))
            .collect()
    }
}

impl From<Vec<String>> for Whitelist {
    fn from(fields: Vec<String>) -> Self {
        Self::new(fields)
    }
}

impl From<Whitelist> for Vec<String> {
    fn from(whitelist: Whitelist) -> Self {
        whitelist.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn parse_trims_and_dedupes() {
        let w = Whitelist::parse(" name, age,,name ,address");
        assert_eq!(w.iter().collect::<Vec<_>>(), vec!["name", "age", "address"]);
    }

    #[test]
    fn empty_string_is_empty_whitelist() {
        assert!(Whitelist::parse("").is_empty());
    }

    #[test]
    fn projection_keeps_order() {
        let w = Whitelist::new(["name", "age"]);
        assert_eq!(w.projection(), doc! { "name": 1, "age": 1 });
    }
}
