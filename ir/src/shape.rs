//! Static and partially known shapes.
//!
//! Graph values carry a [`PartialShape`]: the rank and every dimension may be
//! unknown until execution. Buffers are always sized from a fully static
//! [`Shape`], obtained with [`PartialShape::to_shape`].

use std::fmt;

use smallvec::SmallVec;

/// Fully static shape.
///
/// Inline capacity of 4 covers the common tensor ranks without heap allocation.
pub type Shape = SmallVec<[usize; 4]>;

/// Number of elements described by a static shape (1 for scalars).
pub fn element_count(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// One dimension of a [`PartialShape`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Static(usize),
    Dynamic,
}

impl Dimension {
    pub fn as_static(&self) -> Option<usize> {
        match self {
            Dimension::Static(d) => Some(*d),
            Dimension::Dynamic => None,
        }
    }

    /// Whether two dimensions can describe the same runtime extent.
    pub fn compatible(&self, other: &Dimension) -> bool {
        match (self, other) {
            (Dimension::Static(a), Dimension::Static(b)) => a == b,
            _ => true,
        }
    }
}

impl From<usize> for Dimension {
    fn from(value: usize) -> Self {
        Dimension::Static(value)
    }
}

/// Shape whose rank (`dims == None`) or individual dimensions may be dynamic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartialShape {
    dims: Option<SmallVec<[Dimension; 4]>>,
}

impl PartialShape {
    /// Shape with unknown rank.
    pub fn dynamic() -> Self {
        Self { dims: None }
    }

    /// Shape with known rank and possibly dynamic dimensions.
    pub fn new(dims: impl IntoIterator<Item = Dimension>) -> Self {
        Self { dims: Some(dims.into_iter().collect()) }
    }

    /// Rank-0 shape.
    pub fn scalar() -> Self {
        Self { dims: Some(SmallVec::new()) }
    }

    pub fn rank(&self) -> Option<usize> {
        self.dims.as_ref().map(|d| d.len())
    }

    pub fn dims(&self) -> Option<&[Dimension]> {
        self.dims.as_deref()
    }

    pub fn is_static(&self) -> bool {
        self.dims.as_ref().is_some_and(|dims| dims.iter().all(|d| d.as_static().is_some()))
    }

    /// Convert to a static shape, `None` if rank or any dimension is dynamic.
    pub fn to_shape(&self) -> Option<Shape> {
        self.dims.as_ref()?.iter().map(Dimension::as_static).collect()
    }

    /// Whether both shapes can describe the same runtime shape.
    pub fn compatible(&self, other: &PartialShape) -> bool {
        match (&self.dims, &other.dims) {
            (Some(a), Some(b)) => a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.compatible(y)),
            _ => true,
        }
    }

    /// Whether this shape describes exactly the given static shape.
    pub fn same_as(&self, shape: &[usize]) -> bool {
        self.to_shape().is_some_and(|s| s.as_slice() == shape)
    }
}

impl From<&[usize]> for PartialShape {
    fn from(shape: &[usize]) -> Self {
        Self::new(shape.iter().copied().map(Dimension::Static))
    }
}

impl<const N: usize> From<[usize; N]> for PartialShape {
    fn from(shape: [usize; N]) -> Self {
        Self::from(shape.as_slice())
    }
}

impl From<Shape> for PartialShape {
    fn from(shape: Shape) -> Self {
        Self::from(shape.as_slice())
    }
}

impl fmt::Display for PartialShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(dims) = &self.dims else {
            return write!(f, "[...]");
        };
        write!(f, "[")?;
        for (i, dim) in dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match dim {
                Dimension::Static(d) => write!(f, "{d}")?,
                Dimension::Dynamic => write!(f, "?")?,
            }
        }
        write!(f, "]")
    }
}
