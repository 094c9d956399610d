//! Compilation of raw rule strings into negatable atoms.

use std::fmt;

/// Marker that inverts the match sense of a single atom.
pub const NEGATION_MARKER: char = '!';

/// One negatable name token of a compiled rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Atom {
    name: String,
    negated: bool,
}

impl Atom {
    /// Parses a single token. A leading `!` marks the atom as negated; only the
    /// first marker is consumed, so `!!a` is a negated atom named `!a`.
    pub fn parse(token: &str) -> Self {
        match token.strip_prefix(NEGATION_MARKER) {
            Some(name) => Atom { name: name.to_string(), negated: true },
            None => Atom { name: token.to_string(), negated: false },
        }
    }

    /// The name to compare against, without the negation marker.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn negated(&self) -> bool {
        self.negated
    }

    /// The token as it was written in the configuration.
    pub fn raw(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "{}{}", NEGATION_MARKER, self.name)
        } else {
            f.write_str(&self.name)
        }
    }
}

/// An ordered sequence of atoms.
///
/// Order follows the input and only matters for short-circuiting during
/// evaluation, never for the result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Expression {
    atoms: Vec<Atom>,
}

impl Expression {
    /// Compiles raw rule strings into an expression.
    ///
    /// Each element may itself hold a comma-separated list. Every element is split
    /// on `,`, empty tokens are discarded and the rest become atoms in encountered
    /// order. Compilation never fails: any non-empty token, however odd, is an atom.
    ///
    /// # Returns
    /// The compiled expression; `len()` is the number of atoms produced, which may
    /// differ from the number of input elements.
    pub fn compile<I, S>(raw: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let atoms = raw
            .into_iter()
            .flat_map(|element| {
                element
                    .as_ref()
                    .split(',')
                    .filter(|token| !token.is_empty())
                    .map(Atom::parse)
                    .collect::<Vec<_>>()
            })
            .collect();
        Expression { atoms }
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    /// Number of atoms actually produced by compilation.
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Atom> {
        self.atoms.iter()
    }
}

impl<'a> IntoIterator for &'a Expression {
    type Item = &'a Atom;
    type IntoIter = std::slice::Iter<'a, Atom>;

    fn into_iter(self) -> Self::IntoIter {
        self.atoms.iter()
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, atom) in self.atoms.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", atom)?;
        }
        Ok(())
    }
}
