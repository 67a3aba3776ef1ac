use std::{
    collections::HashMap,
    ops::{Deref, DerefMut},
};

use tracing::debug;

use crate::{
    ast::{Line, Node, Rule, Variables},
    error::Error,
};

// Truncates the buffer back to where it was on drop.
struct Mark<'b> {
    buf: &'b mut String,
    len: usize,
}

impl<'b> Mark<'b> {
    fn push(buf: &'b mut String, text: &str) -> Self {
        let len = buf.len();
        buf.push_str(text);
        Self { buf, len }
    }
}

impl Deref for Mark<'_> {
    type Target = String;

    fn deref(&self) -> &String {
        &*self.buf
    }
}

impl DerefMut for Mark<'_> {
    fn deref_mut(&mut self) -> &mut String {
        &mut *self.buf
    }
}

impl Drop for Mark<'_> {
    fn drop(&mut self) {
        self.buf.truncate(self.len);
    }
}

#[derive(Debug, Clone, Copy)]
enum Step<'a> {
    Text(&'static str),
    Node(&'a Node),
}

fn nodes(line: &Line) -> impl Iterator<Item = Step<'_>> {
    line.nodes().iter().map(Step::Node)
}

fn name_steps(rule: &Rule) -> Vec<Step<'_>> {
    nodes(&rule.name).collect()
}

// Lines of one block are joined with '\n'; values never contain one.
fn block_steps(rule: &Rule) -> Vec<Step<'_>> {
    let mut steps = name_steps(rule);
    steps.push(Step::Text(":"));
    for dep in rule.dependencies.iter() {
        steps.push(Step::Text(" "));
        steps.extend(nodes(dep));
    }
    for cmd in rule.content.iter() {
        steps.push(Step::Text("\n"));
        steps.extend(nodes(cmd));
    }
    steps
}

#[derive(Debug, Clone, Copy)]
struct Binding {
    index: usize,
    len: usize,
}

struct Walk<'a, F> {
    vars: &'a Variables,
    rule: &'a Rule,
    steps: Vec<Step<'a>>,
    tags: HashMap<&'a str, Binding>,
    emit: F,
}

impl<'a, F> Walk<'a, F>
where
    F: FnMut(&str),
{
    fn new(vars: &'a Variables, rule: &'a Rule, steps: Vec<Step<'a>>, emit: F) -> Self {
        Self {
            vars,
            rule,
            steps,
            tags: HashMap::new(),
            emit,
        }
    }

    fn run(mut self) -> Result<(), Error> {
        let mut buf = String::new();
        self.step(0, &mut buf)
    }

    fn values(&self, name: &str) -> Result<&'a [String], Error> {
        let vars = self.vars;
        vars.get(name).map(Vec::as_slice).ok_or_else(|| Error::Reference {
            name: name.to_string(),
            rule: self.rule.name.to_string(),
        })
    }

    fn push(&mut self, pos: usize, buf: &mut String, text: &str) -> Result<(), Error> {
        let mut buf = Mark::push(buf, text);
        self.step(pos + 1, &mut buf)
    }

    fn step(&mut self, pos: usize, buf: &mut String) -> Result<(), Error> {
        let Some(&step) = self.steps.get(pos) else {
            (self.emit)(buf.as_str());
            return Ok(());
        };

        let (name, tag) = match step {
            Step::Text(text) => return self.push(pos, buf, text),
            Step::Node(Node::Literal(text)) => return self.push(pos, buf, text),
            Step::Node(Node::Placeholder { name, tag }) => (name.as_str(), tag.as_deref()),
        };
        let values = self.values(name)?;

        let Some(tag) = tag else {
            return values.iter().try_for_each(|v| self.push(pos, buf, v));
        };

        if let Some(&bound) = self.tags.get(tag) {
            let value = values
                .get(bound.index)
                .ok_or_else(|| Error::TagConsistency {
                    tag: tag.to_string(),
                    name: name.to_string(),
                    expected: bound.len,
                    found: values.len(),
                    rule: self.rule.name.to_string(),
                })?;
            return self.push(pos, buf, value);
        }

        let len = values.len();
        self.tags.insert(tag, Binding { index: 0, len });
        let result = values.iter().enumerate().try_for_each(|(index, v)| {
            self.tags.insert(tag, Binding { index, len });
            self.push(pos, buf, v)
        });
        self.tags.remove(tag);
        result
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub header: String,
    pub commands: Vec<String>,
}

pub fn expand_names(vars: &Variables, rule: &Rule) -> Result<Vec<String>, Error> {
    let mut names = Vec::new();
    Walk::new(vars, rule, name_steps(rule), |name: &str| {
        names.push(name.to_string())
    })
    .run()?;
    Ok(names)
}

// Untagged placeholders are independent dimensions; a tag is one dimension.
// The first dimension met varies slowest.
pub fn expand_blocks(vars: &Variables, rule: &Rule) -> Result<Vec<Block>, Error> {
    let mut blocks = Vec::new();
    Walk::new(vars, rule, block_steps(rule), |text: &str| {
        let mut lines = text.split('\n');
        let header = lines.next().unwrap_or_default().to_string();
        let commands = lines.map(str::to_string).collect();
        blocks.push(Block { header, commands });
    })
    .run()?;

    debug!(rule = %rule.name, combinations = blocks.len(), "expanded rule");
    Ok(blocks)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{ast::Parse as _, parser::TemplateFile};

    fn parse(input: &str) -> crate::ast::ParsedFile {
        let mut file = TemplateFile::parse(input).unwrap();
        file.default_empty_values();
        file
    }

    fn block(header: &str, commands: &[&str]) -> Block {
        Block {
            header: header.to_string(),
            commands: commands.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn test_mark_restores() {
        let mut buf = String::from("a");
        {
            let mut outer = Mark::push(&mut buf, "bc");
            {
                let inner = Mark::push(&mut outer, "de");
                assert_eq!(inner.as_str(), "abcde");
            }
            assert_eq!(outer.as_str(), "abc");
        }
        assert_eq!(buf, "a");
    }

    #[test]
    fn test_untagged() {
        let file = parse("N = \"1\" \"2\" \"3\"\nfile{N}:\n\techo {N}\n");
        let rule = &file.rules[0];

        let names = expand_names(&file.variables, rule).unwrap();
        assert_eq!(names, ["file1", "file2", "file3"]);

        // Same variable twice, untagged: independent dimensions.
        let blocks = expand_blocks(&file.variables, rule).unwrap();
        assert_eq!(blocks.len(), 9);
        assert_eq!(blocks[0], block("file1:", &["echo 1"]));
        assert_eq!(blocks[1], block("file1:", &["echo 2"]));
        assert_eq!(blocks[3], block("file2:", &["echo 1"]));
        assert_eq!(blocks[8], block("file3:", &["echo 3"]));
    }

    #[test]
    fn test_tagged() {
        let file = parse(
            "SRC = \"a\" \"b\"\nOBJ = \"a.o\" \"b.o\"\nbuild{SRC, x}: {OBJ, x}\n\tlink {OBJ, x}\n",
        );
        let rule = &file.rules[0];

        assert_eq!(
            expand_names(&file.variables, rule).unwrap(),
            ["builda", "buildb"]
        );
        assert_eq!(
            expand_blocks(&file.variables, rule).unwrap(),
            [
                block("builda: a.o", &["link a.o"]),
                block("buildb: b.o", &["link b.o"]),
            ]
        );
    }

    #[test]
    fn test_dimension_order() {
        // A first (slowest), then tag t shared by B and C, then D in a command.
        let file = parse(
            "A = 1 2\nB = x y\nC = X Y\nD = p q\n{A}{B, t}: {C, t}\n\t{D} {C, t}\n",
        );
        let blocks = expand_blocks(&file.variables, &file.rules[0]).unwrap();
        let got = blocks
            .iter()
            .map(|b| format!("{} / {}", b.header, b.commands.join(" | ")))
            .collect::<Vec<_>>();
        assert_eq!(
            got,
            [
                "1x: X / p X",
                "1x: X / q X",
                "1y: Y / p Y",
                "1y: Y / q Y",
                "2x: X / p X",
                "2x: X / q X",
                "2y: Y / p Y",
                "2y: Y / q Y",
            ]
        );
    }

    #[test]
    fn test_walks_keep_separate_bindings() {
        // The name walk binds `a` without leaking into the block walk, and a
        // tag first met in a dependency is still a single dimension.
        let file = parse("A = 1 2\nB = a b\nout{A, a}: {B, t}\n\tcp {B, t} {A, a}\n");
        let rule = &file.rules[0];
        assert_eq!(expand_names(&file.variables, rule).unwrap(), ["out1", "out2"]);
        assert_eq!(
            expand_blocks(&file.variables, rule).unwrap(),
            [
                block("out1: a", &["cp a 1"]),
                block("out1: b", &["cp b 1"]),
                block("out2: a", &["cp a 2"]),
                block("out2: b", &["cp b 2"]),
            ]
        );
    }

    #[test]
    fn test_empty_value() {
        let defaulted = parse("E =\nout-{E}-done:\n\ttouch {E}x\n");
        let explicit = parse("E = \"\"\nout-{E}-done:\n\ttouch {E}x\n");

        for file in [defaulted, explicit] {
            let rule = &file.rules[0];
            assert_eq!(expand_names(&file.variables, rule).unwrap(), ["out--done"]);
            assert_eq!(
                expand_blocks(&file.variables, rule).unwrap(),
                [block("out--done:", &["touch x"])]
            );
        }
    }

    #[test]
    fn test_multiple_deps_and_commands() {
        let file = parse("V = 1 2\nall: a b{V}\n\tone\n\ttwo {V}\n");
        let blocks = expand_blocks(&file.variables, &file.rules[0]).unwrap();
        assert_eq!(
            blocks,
            [
                block("all: a b1", &["one", "two 1"]),
                block("all: a b1", &["one", "two 2"]),
                block("all: a b2", &["one", "two 1"]),
                block("all: a b2", &["one", "two 2"]),
            ]
        );
    }

    #[test]
    fn test_deterministic() {
        let file = parse("A = 3 1 2\nB = z y\nx{A}{B}:\n");
        let rule = &file.rules[0];
        let first = expand_names(&file.variables, rule).unwrap();
        let second = expand_names(&file.variables, rule).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, ["x3z", "x3y", "x1z", "x1y", "x2z", "x2y"]);
    }

    #[test]
    fn test_error_restores_buffer() {
        let file = parse("A = 1 2\nout{A}: dep\n\techo {MISSING}\n");
        let rule = &file.rules[0];
        let mut emitted = 0;
        let mut walk = Walk::new(&file.variables, rule, block_steps(rule), |_: &str| {
            emitted += 1
        });

        let mut buf = String::from("keep");
        let result = walk.step(0, &mut buf);
        assert_eq!(
            result,
            Err(Error::Reference {
                name: "MISSING".into(),
                rule: "out{A}".into(),
            })
        );
        assert_eq!(buf, "keep");
        assert!(walk.tags.is_empty());
        drop(walk);
        assert_eq!(emitted, 0);
    }

    #[test]
    fn test_tag_mismatch_without_validation() {
        let file = parse("A = 1 2 3\nB = x y\n{A, t}{B, t}:\n");
        let result = expand_names(&file.variables, &file.rules[0]);
        assert!(matches!(
            result,
            Err(Error::TagConsistency { expected: 3, found: 2, .. })
        ));
    }
}
