// export/type_mapper.rs
// Maps provider type codes to canonical SQL type names

use std::collections::HashMap;

/// Type codes understood by [`TypeMapper::dao`]. These follow the DAO field type numbering;
/// the sqlx adapters classify their native types into the same codes.
pub mod type_codes {
    pub const UNKNOWN: i32 = 0;
    pub const BOOLEAN: i32 = 1;
    pub const INTEGER: i32 = 3;
    pub const LONG: i32 = 4;
    pub const CURRENCY: i32 = 5;
    pub const SINGLE: i32 = 7;
    pub const DOUBLE: i32 = 8;
    pub const DATE: i32 = 9;
    pub const TEXT: i32 = 10;
    pub const BINARY: i32 = 11;
    pub const MEMO: i32 = 12;
}

pub const UNKNOWN_TYPE_NAME: &str = "Unknown";

#[derive(Debug, Clone)]
pub struct TypeMapper {
    names: HashMap<i32, &'static str>,
}

impl TypeMapper {
    /// The fixed DAO mapping. `TEXT` and `MEMO` both render as `Text`.
    pub fn dao() -> Self {
        use type_codes::*;
        let names = HashMap::from([
            (BOOLEAN, "Boolean"),
            (INTEGER, "Integer"),
            (LONG, "Long"),
            (CURRENCY, "Currency"),
            (SINGLE, "Single"),
            (DOUBLE, "Double"),
            (DATE, "Date"),
            (TEXT, "Text"),
            (BINARY, "Binary"),
            (MEMO, "Text"),
        ]);
        Self { names }
    }

    pub fn lookup(&self, type_code: i32) -> Option<&'static str> {
        self.names.get(&type_code).copied()
    }

    /// Canonical name for `type_code`, or `"Unknown"` when the code is not mapped.
    pub fn map_type(&self, type_code: i32) -> &'static str {
        self.lookup(type_code).unwrap_or(UNKNOWN_TYPE_NAME)
    }

    /// Canonical name with a `(size)` qualifier when `size` is positive.
    pub fn column_type(&self, type_code: i32, size: Option<i64>) -> String {
        let name = self.map_type(type_code);
        match size {
            Some(size) if size > 0 => format!("{}({})", name, size),
            _ => name.to_string(),
        }
    }
}

impl Default for TypeMapper {
    fn default() -> Self {
        Self::dao()
    }
}

#[cfg(test)]
mod tests {
    use super::type_codes::*;
    use super::*;

    #[test]
    fn maps_known_codes() {
        let mapper = TypeMapper::dao();
        assert_eq!(mapper.map_type(BOOLEAN), "Boolean");
        assert_eq!(mapper.map_type(LONG), "Long");
        assert_eq!(mapper.map_type(CURRENCY), "Currency");
        assert_eq!(mapper.map_type(BINARY), "Binary");
    }

    #[test]
    fn text_and_memo_share_a_name() {
        let mapper = TypeMapper::dao();
        assert_eq!(mapper.map_type(TEXT), mapper.map_type(MEMO));
    }

    #[test]
    fn unknown_code_falls_back() {
        let mapper = TypeMapper::dao();
        assert_eq!(mapper.map_type(999), "Unknown");
        assert_eq!(mapper.lookup(999), None);
        assert_eq!(mapper.column_type(UNKNOWN, Some(12)), "Unknown(12)");
    }

    #[test]
    fn size_qualifier_only_when_positive() {
        let mapper = TypeMapper::dao();
        assert_eq!(mapper.column_type(TEXT, Some(50)), "Text(50)");
        assert_eq!(mapper.column_type(TEXT, Some(0)), "Text");
        assert_eq!(mapper.column_type(TEXT, None), "Text");
    }
}
