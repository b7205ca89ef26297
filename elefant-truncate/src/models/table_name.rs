use std::fmt::{Display, Formatter};

pub const DEFAULT_SCHEMA: &str = "public";

/// A schema qualified table name.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct TableName {
    pub schema: String,
    pub name: String,
}

impl TableName {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        TableName {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Parses a table name as given on the command line. Names without a schema are looked up
    /// in the `public` schema.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        match value.split_once('.') {
            Some((schema, name)) => Self::new(schema, name),
            None => Self::new(DEFAULT_SCHEMA, value),
        }
    }
}

impl Display for TableName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_with_and_without_schema() {
        assert_eq!(TableName::parse("orders"), TableName::new("public", "orders"));
        assert_eq!(
            TableName::parse(" sales.orders "),
            TableName::new("sales", "orders")
        );
        assert_eq!(TableName::new("sales", "orders").to_string(), "sales.orders");
    }
}
