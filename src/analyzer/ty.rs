use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataType {
    Int,
    Char,
}

impl DataType {
    /// Storage size in bytes of one scalar or one array element.
    pub fn sizeof(&self) -> usize {
        match self {
            DataType::Int => 8,
            DataType::Char => 1,
        }
    }

    /// There are no implicit conversions between `int` and `char`.
    pub fn is_compatible(&self, other: &Self) -> bool {
        self == other
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DataType::Int => write!(f, "int"),
            DataType::Char => write!(f, "char"),
        }
    }
}
