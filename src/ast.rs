use std::{collections::HashMap, fmt};

pub type Variables = HashMap<String, Vec<String>>;

pub trait Parse<'a> {
    type Error;

    fn parse(input: &'a str) -> Result<ParsedFile, Self::Error>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Literal(String),
    Placeholder { name: String, tag: Option<String> },
}

impl Node {
    pub fn literal(text: impl Into<String>) -> Self {
        Node::Literal(text.into())
    }

    pub fn var(name: impl Into<String>) -> Self {
        Node::Placeholder {
            name: name.into(),
            tag: None,
        }
    }

    pub fn tagged(name: impl Into<String>, tag: impl Into<String>) -> Self {
        Node::Placeholder {
            name: name.into(),
            tag: Some(tag.into()),
        }
    }
}

/// One templated fragment: a rule name, a single dependency or a command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Line(Vec<Node>);

impl Line {
    pub fn nodes(&self) -> &[Node] {
        &self.0
    }

    pub fn push(&mut self, node: Node) {
        self.0.push(node);
    }

    pub fn placeholders(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.0.iter().filter_map(|n| match n {
            Node::Placeholder { name, tag } => Some((name.as_str(), tag.as_deref())),
            Node::Literal(_) => None,
        })
    }
}

impl From<Vec<Node>> for Line {
    fn from(nodes: Vec<Node>) -> Self {
        Self(nodes)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rule {
    pub name: Line,
    pub dependencies: Vec<Line>,
    pub content: Vec<Line>,
}

impl Rule {
    /// Name, then dependencies, then commands.
    pub fn lines(&self) -> impl Iterator<Item = &Line> {
        std::iter::once(&self.name)
            .chain(self.dependencies.iter())
            .chain(self.content.iter())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFile {
    pub variables: Variables,
    pub rules: Vec<Rule>,
}

impl ParsedFile {
    /// Gives every variable declared without values a single empty value.
    pub fn default_empty_values(&mut self) {
        for values in self.variables.values_mut() {
            if values.is_empty() {
                values.push(String::new());
            }
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Literal(text) => f.write_str(text),
            Node::Placeholder { name, tag: None } => write!(f, "{{{}}}", name),
            Node::Placeholder {
                name,
                tag: Some(tag),
            } => write!(f, "{{{}, {}}}", name, tag),
        }
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.iter().try_for_each(|n| write!(f, "{}", n))
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.name)?;
        for dep in self.dependencies.iter() {
            write!(f, " {}", dep)?;
        }
        writeln!(f)?;
        for cmd in self.content.iter() {
            writeln!(f, "\t{}", cmd)?;
        }
        Ok(())
    }
}

impl fmt::Display for ParsedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = self.variables.keys().collect::<Vec<_>>();
        names.sort();
        for name in names {
            write!(f, "{} =", name)?;
            // A value holding '"' can only have been written bare.
            for value in self.variables[name].iter() {
                if value.contains('"') {
                    write!(f, " {}", value)?;
                } else {
                    write!(f, " \"{}\"", value)?;
                }
            }
            writeln!(f)?;
        }
        self.rules.iter().try_for_each(|r| write!(f, "{}", r))
    }
}
