//! SQL text with positional parameters.

use serde::Serialize;

/// SQL text plus the values of its `?N` placeholders, `params[N - 1]` for `?N`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlFragment {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

/// A value bound to a placeholder. Booleans, dates and datetimes are bound in their
/// SQLite storage form (integers and text).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlParam {
    String(String),
    Integer(i64),
    Float(f64),
    Null,
}

impl SqlParam {
    pub fn string(s: impl Into<String>) -> Self {
        SqlParam::String(s.into())
    }

    pub fn integer(i: i64) -> Self {
        SqlParam::Integer(i)
    }

    pub fn float(f: f64) -> Self {
        SqlParam::Float(f)
    }
}

impl SqlFragment {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Binds `param` to the next placeholder and returns that placeholder.
    pub fn add_param(&mut self, param: SqlParam) -> String {
        self.params.push(param);
        format!("?{}", self.params.len())
    }

    pub fn push_str(&mut self, sql: &str) {
        self.sql.push_str(sql);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_are_positional() {
        let mut fragment = SqlFragment::new("SELECT * FROM t WHERE a = ");
        let first = fragment.add_param(SqlParam::integer(1));
        fragment.push_str(&first);
        fragment.push_str(" AND b = ");
        let second = fragment.add_param(SqlParam::string("x"));
        fragment.push_str(&second);

        assert_eq!(fragment.sql, "SELECT * FROM t WHERE a = ?1 AND b = ?2");
        assert_eq!(
            fragment.params,
            vec![SqlParam::Integer(1), SqlParam::String("x".to_string())]
        );
    }

    #[test]
    fn test_params_serialize_as_plain_values() {
        let params = vec![
            SqlParam::string("Acme"),
            SqlParam::integer(2),
            SqlParam::float(1.5),
            SqlParam::Null,
        ];
        assert_eq!(
            serde_json::to_value(&params).unwrap(),
            serde_json::json!(["Acme", 2, 1.5, null])
        );
    }
}
