use pest::{error::InputLocation, iterators::Pair, Parser as _};
use tracing::trace;

use crate::{
    ast::{Line, Node, Rule},
    error::{Error, Location, TokenizeError},
};

mod grammar {
    #[derive(pest_derive::Parser)]
    #[grammar = "template.pest"] // relative to src
    pub struct TemplateParser;
}

use grammar::{Rule as Grammar, TemplateParser};

// Same set as `ws` in template.pest and `WHITESPACE` in definition.pest.
pub fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\x0C')
}

fn is_ident(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

// On failure, the offset in `text` where the grammar gave up.
fn parse(entry: Grammar, text: &str, start: usize) -> Result<Pair<'_, Grammar>, usize> {
    let mut pairs = TemplateParser::parse(entry, &text[start..]).map_err(|e| {
        start
            + match e.location {
                InputLocation::Pos(p) => p,
                InputLocation::Span((s, _)) => s,
            }
    })?;
    pairs.next().ok_or(start)
}

fn placeholder_fault(text: &str, pos: usize) -> Option<TokenizeError> {
    let at = text[pos..].chars().next();
    if at == Some('}') {
        return Some(TokenizeError::UnmatchedClose(pos));
    }

    let open = text[..pos]
        .rfind('{')
        .filter(|&open| !text[open..pos].contains('}'))?;
    let inside = &text[open + 1..pos];
    let comma = inside.find(',');
    if let Some(comma) = comma {
        if !inside.starts_with(is_ident) {
            return Some(TokenizeError::MissingName(open + 1 + comma));
        }
    }

    Some(match at {
        None => TokenizeError::ExpectedClose,
        Some('{') => TokenizeError::Nested(pos),
        Some(_) if comma.is_some() => TokenizeError::MultipleTags(pos),
        Some(_) => TokenizeError::MultipleNames(pos),
    })
}

fn placeholder(pair: Pair<Grammar>, offset: usize) -> Result<Node, TokenizeError> {
    let mut name = "";
    let mut tag = None;
    let mut comma = None;
    for part in pair.into_inner() {
        let pos = offset + part.as_span().start();
        match part.as_rule() {
            Grammar::var_name => name = part.as_str(),
            Grammar::comma => comma = Some(pos),
            Grammar::var_tag => tag = Some(part.as_str()),
            Grammar::close if name.is_empty() => {
                return Err(TokenizeError::MissingName(comma.unwrap_or(pos)))
            }
            Grammar::close if tag == Some("") => return Err(TokenizeError::MissingTag(pos)),
            _ => {}
        }
    }

    Ok(match tag {
        Some(tag) => Node::tagged(name, tag),
        None => Node::var(name),
    })
}

fn line(pair: Pair<Grammar>, offset: usize) -> Result<Line, TokenizeError> {
    let mut line = Line::default();
    for part in pair.into_inner() {
        match part.as_rule() {
            Grammar::placeholder => line.push(placeholder(part, offset)?),
            Grammar::name_text | Grammar::word_text | Grammar::command_text => {
                line.push(Node::literal(part.as_str()))
            }
            _ => {}
        }
    }
    Ok(line)
}

pub fn header(text: &str, at: &Location) -> Result<Rule, Error> {
    let pair = parse(Grammar::header, text, 0).map_err(|pos| match placeholder_fault(text, pos) {
        Some(kind) => Error::tokenize(kind, at),
        None => Error::Header {
            pos,
            at: at.clone(),
        },
    })?;

    let mut rule = Rule::default();
    for part in pair.into_inner() {
        match part.as_rule() {
            Grammar::rule_name => rule.name = line(part, 0).map_err(|e| Error::tokenize(e, at))?,
            Grammar::dependency => rule
                .dependencies
                .push(line(part, 0).map_err(|e| Error::tokenize(e, at))?),
            _ => {}
        }
    }

    trace!(rule = %rule.name, deps = rule.dependencies.len(), "rule header");
    Ok(rule)
}

pub fn command(text: &str, at: &Location) -> Result<Line, Error> {
    let start = text.len() - text.trim_start_matches(is_space).len();
    let pair = parse(Grammar::command, text, start).map_err(|pos| {
        let kind = placeholder_fault(text, pos).unwrap_or(TokenizeError::ExpectedClose);
        Error::tokenize(kind, at)
    })?;
    line(pair, start).map_err(|e| Error::tokenize(e, at))
}
