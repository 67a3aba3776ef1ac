use std::sync::OnceLock;

use pest::{error::InputLocation, Parser as _};
use tracing::debug;

use crate::{
    ast::{self, ParsedFile, Variables},
    error::{DefinitionErrorKind, Error, Location},
    tokenizer::{command, header, is_space},
};

macro_rules! regex {
    ($re:literal $(,)?) => {{
        static RE: OnceLock<regex::Regex> = OnceLock::new();
        RE.get_or_init(|| regex::Regex::new($re).expect("Invalid regex!"))
    }};
}

mod grammar {
    #[derive(pest_derive::Parser)]
    #[grammar = "definition.pest"] // relative to src
    pub struct DefinitionParser;
}

use grammar::{DefinitionParser, Rule as Grammar};

fn is_blank(line: &str) -> bool {
    line.chars().all(is_space)
}

fn parse_values(rhs: &str, offset: usize, at: &Location) -> Result<Vec<String>, Error> {
    let pairs = DefinitionParser::parse(Grammar::values, rhs).map_err(|e| {
        let pos = match e.location {
            InputLocation::Pos(p) => p,
            InputLocation::Span((s, _)) => s,
        };
        Error::Definition {
            kind: DefinitionErrorKind::UnterminatedQuote(offset + pos),
            at: at.clone(),
        }
    })?;

    let values = pairs
        .flat_map(|p| p.into_inner())
        .filter_map(|p| match p.as_rule() {
            Grammar::quoted => {
                let s = p.as_str();
                Some(s[1..s.len() - 1].to_string())
            }
            Grammar::bare => Some(p.as_str().to_string()),
            _ => None,
        })
        .collect();
    Ok(values)
}

/// Records `line` as a variable definition if it looks like one.
fn definition(line: &str, vars: &mut Variables, at: &Location) -> Result<bool, Error> {
    let re_def = regex!(r"^[ \t\r\x0C]*([A-Za-z0-9_]+)[ \t\r\x0C]*=");
    let Some(cap) = re_def.captures(line) else {
        return Ok(false);
    };
    let name = &cap[1];
    if vars.contains_key(name) {
        return Err(Error::Definition {
            kind: DefinitionErrorKind::Redefinition(name.to_string()),
            at: at.clone(),
        });
    }

    let offset = cap.get(0).map_or(0, |m| m.end());
    let values = parse_values(&line[offset..], offset, at)?;
    debug!(name, ?values, "variable defined");
    vars.insert(name.to_string(), values);
    Ok(true)
}

pub struct TemplateFile;
impl<'a> ast::Parse<'a> for TemplateFile {
    type Error = Error;

    /// Definitions are only recognised before the first line that is not
    /// one; every later line is a rule header or a command.
    fn parse(input: &'a str) -> Result<ParsedFile, Self::Error> {
        let mut file = ParsedFile::default();
        let mut rule_mode = false;

        for (i, line) in input.lines().enumerate() {
            if is_blank(line) {
                continue;
            }
            let at = Location::new(i + 1, line);

            if !rule_mode {
                if definition(line, &mut file.variables, &at)? {
                    continue;
                }
                debug!(line = at.line_no, "first rule line");
                rule_mode = true;
            }

            if line.starts_with(is_space) {
                let cmd = command(line, &at)?;
                file.rules
                    .last_mut()
                    .ok_or(Error::Scope { at })?
                    .content
                    .push(cmd);
                continue;
            }
            file.rules.push(header(line, &at)?);
        }

        debug!(
            variables = file.variables.len(),
            rules = file.rules.len(),
            "parsed template file"
        );
        Ok(file)
    }
}
