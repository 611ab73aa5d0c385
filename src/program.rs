use std::fmt;
use std::ops::Deref;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::LoadError;

/// An immutable Intcode load image.
///
/// Cloning is cheap: every clone shares the same backing slice, so a driver
/// can boot fifty network nodes from one parsed program without copying it
/// fifty times. A [`Computer`](crate::computer::Computer) copies the image
/// into its own tape on load and reset.
#[derive(Clone, PartialEq, Eq)]
pub struct Program(Arc<[i64]>);

impl Program {
    pub fn new(values: impl Into<Arc<[i64]>>) -> Self {
        Self(values.into())
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.0
    }
}

impl Deref for Program {
    type Target = [i64];

    fn deref(&self) -> &[i64] {
        &self.0
    }
}

impl From<Vec<i64>> for Program {
    fn from(values: Vec<i64>) -> Self {
        Self::new(values)
    }
}

impl From<&[i64]> for Program {
    fn from(values: &[i64]) -> Self {
        Self::new(values)
    }
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Program({} words)", self.0.len())
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{value}")?;
        }
        Ok(())
    }
}

/// Parse comma-separated signed integers, ignoring surrounding whitespace
/// and newlines.
impl FromStr for Program {
    type Err = LoadError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.trim();
        if text.is_empty() {
            return Err(LoadError::Empty);
        }
        let values = text
            .split(',')
            .enumerate()
            .map(|(index, field)| {
                let field = field.trim();
                field.parse::<i64>().map_err(|_| LoadError::InvalidValue {
                    index,
                    text: field.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let program: Program = "1,0,0,3,99".parse().unwrap();
        assert_eq!(program.as_slice(), &[1, 0, 0, 3, 99]);
    }

    #[test]
    fn test_parse_negative_and_whitespace() {
        let program: Program = "  1101, 100,-1,4,0\n".parse().unwrap();
        assert_eq!(program.as_slice(), &[1101, 100, -1, 4, 0]);
    }

    #[test]
    fn test_parse_large_values() {
        let program: Program = "104,1125899906842624,99".parse().unwrap();
        assert_eq!(program[1], 1125899906842624);
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!("".parse::<Program>(), Err(LoadError::Empty));
        assert_eq!(" \n ".parse::<Program>(), Err(LoadError::Empty));
    }

    #[test]
    fn test_parse_invalid_field_reports_index() {
        let err = "1,2,x,4".parse::<Program>().unwrap_err();
        assert_eq!(
            err,
            LoadError::InvalidValue {
                index: 2,
                text: "x".into()
            }
        );
    }

    #[test]
    fn test_trailing_comma_is_rejected() {
        let err = "1,2,".parse::<Program>().unwrap_err();
        assert!(matches!(err, LoadError::InvalidValue { index: 2, .. }));
    }

    #[test]
    fn test_clones_share_storage() {
        let program = Program::from(vec![1, 2, 3]);
        let copy = program.clone();
        assert!(std::ptr::eq(program.as_slice(), copy.as_slice()));
    }

    #[test]
    fn test_display_is_program_text() {
        let program: Program = "3,9,8,9,10,9,4,9,99,-1,8".parse().unwrap();
        assert_eq!(program.to_string(), "3,9,8,9,10,9,4,9,99,-1,8");
    }
}
