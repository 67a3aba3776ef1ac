use std::collections::HashMap;

use crate::{
    ast::{Rule, Variables},
    error::Error,
};

/// Checks that every placeholder of `rule` names a defined variable and that
/// placeholders sharing a tag range over equally long value lists.
pub fn check_rule(vars: &Variables, rule: &Rule) -> Result<(), Error> {
    let placeholders = move || rule.lines().flat_map(|l| l.placeholders());

    if let Some((name, _)) = placeholders().find(|(name, _)| !vars.contains_key(*name)) {
        return Err(Error::Reference {
            name: name.to_string(),
            rule: rule.name.to_string(),
        });
    }

    let mut sizes: HashMap<&str, usize> = HashMap::new();
    for (name, tag) in placeholders() {
        let (Some(tag), Some(values)) = (tag, vars.get(name)) else {
            continue;
        };
        let expected = *sizes.entry(tag).or_insert(values.len());
        if expected != values.len() {
            return Err(Error::TagConsistency {
                tag: tag.to_string(),
                name: name.to_string(),
                expected,
                found: values.len(),
                rule: rule.name.to_string(),
            });
        }
    }

    Ok(())
}
