//! Built-in locators

use xdt_traits::{Error, Result};

use crate::locator::{append_step, Axis, Locator, LocatorBinding};

/// Child step named after the instruction element, no predicate
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultLocator;

impl Locator for DefaultLocator {}

/// `Match(key, ...)`: select by the values the instruction element carries
/// for the listed attributes
#[derive(Debug, Default, Clone, Copy)]
pub struct MatchLocator;

impl Locator for MatchLocator {
    fn construct_predicate(&self, binding: &LocatorBinding<'_>) -> Result<String> {
        let keys = binding.ensure_arguments(1)?;
        let mut terms = Vec::with_capacity(keys.len());
        for key in keys {
            let value = binding
                .attribute_value(key)
                .ok_or_else(|| Error::MissingAttribute(key.clone()))?;
            terms.push(format!("@{}={}", key, xpath_literal(value)));
        }
        Ok(terms.join(" and "))
    }
}

/// `Condition(expr)`: the argument is the predicate
#[derive(Debug, Default, Clone, Copy)]
pub struct ConditionLocator;

impl Locator for ConditionLocator {
    fn construct_predicate(&self, binding: &LocatorBinding<'_>) -> Result<String> {
        let arguments = binding.ensure_arguments_between(1, 1)?;
        Ok(arguments[0].clone())
    }
}

/// `XPath(expr)`: an absolute path, or a path relative to the instruction
/// element's own default address
#[derive(Debug, Default, Clone, Copy)]
pub struct XPathLocator;

impl Locator for XPathLocator {
    fn construct_path(&self, binding: &LocatorBinding<'_>) -> Result<String> {
        let arguments = binding.ensure_arguments_between(1, 1)?;
        let xpath = &arguments[0];
        if xpath.starts_with('/') {
            return Ok(xpath.clone());
        }
        let own = append_step(
            binding.parent_path(),
            Axis::Child,
            &self.next_step_node_test(binding),
            "",
        );
        Ok(append_step(&own, Axis::Child, xpath, "").replace("/./", "/"))
    }

    fn construct_parent_path(&self, binding: &LocatorBinding<'_>) -> Result<String> {
        self.construct_path(binding)
    }
}

/// Quote `value` as an XPath string literal
fn xpath_literal(value: &str) -> String {
    match (value.contains('\''), value.contains('"')) {
        (false, _) => format!("'{}'", value),
        (true, false) => format!("\"{}\"", value),
        (true, true) => {
            let parts: Vec<String> = value.split('\'').map(|p| format!("'{}'", p)).collect();
            format!("concat({})", parts.join(", \"'\", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::xpath_literal;

    #[test]
    fn literals_pick_a_safe_quote() {
        assert_eq!(xpath_literal("plain"), "'plain'");
        assert_eq!(xpath_literal("it's"), "\"it's\"");
        assert_eq!(xpath_literal("a'b\"c"), "concat('a', \"'\", 'b\"c')");
    }
}
