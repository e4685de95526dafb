//! Alias and parameter naming.

/// Generates join aliases and parameter names for one query plan.
///
/// Every generated name carries a suffix from a counter owned by the generator, so two
/// names produced by the same generator never collide, whatever the input. Names are
/// only unique within one plan.
#[derive(Debug, Default, Clone)]
pub struct QueryNameGenerator {
    counter: usize,
}

impl QueryNameGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Alias for a join on `association`: `{association}_a{n}`.
    pub fn generate_join_alias(&mut self, association: &str) -> String {
        self.counter += 1;
        format!("{}_a{}", sanitize(association), self.counter)
    }

    /// Name of a bound parameter for `name`: `{name}_p{n}`.
    pub fn generate_parameter_name(&mut self, name: &str) -> String {
        self.counter += 1;
        format!("{}_p{}", sanitize(name), self.counter)
    }

    /// Number of names generated so far.
    pub fn generated(&self) -> usize {
        self.counter
    }
}

/// Replaces everything that cannot appear in an alias with `_`.
fn sanitize(input: &str) -> String {
    let cleaned: String = input
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    match cleaned.chars().next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => cleaned,
        _ => format!("_{}", cleaned),
    }
}
