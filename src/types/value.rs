//! Argument slots passed to `execute`
//!
//! A method's arguments are an ordered list of slots: declared inputs first,
//! then outputs. The layout is fixed when the method is compiled.

use std::fmt;

/// Dense f32 tensor
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    sizes: Vec<usize>,
    data: Vec<f32>,
}

impl Tensor {
    /// Create a tensor, returning `None` if `data` does not match `sizes`
    pub fn new(sizes: Vec<usize>, data: Vec<f32>) -> Option<Self> {
        let numel: usize = sizes.iter().product();
        (numel == data.len()).then_some(Self { sizes, data })
    }

    /// One-dimensional tensor over the given values
    pub fn from_vec(data: Vec<f32>) -> Self {
        Self {
            sizes: vec![data.len()],
            data,
        }
    }

    /// Zero-filled tensor
    pub fn zeros(sizes: Vec<usize>) -> Self {
        let numel = sizes.iter().product();
        Self {
            sizes,
            data: vec![0.0; numel],
        }
    }

    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Reshape in place to `sizes`; storage only grows when needed
    pub fn resize(&mut self, sizes: &[usize]) {
        let numel = sizes.iter().product();
        self.sizes = sizes.to_vec();
        self.data.resize(numel, 0.0);
    }
}

/// A single argument slot
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Tensor(Tensor),
}

impl Value {
    pub fn as_tensor(&self) -> Option<&Tensor> {
        match self {
            Value::Tensor(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_tensor_mut(&mut self) -> Option<&mut Tensor> {
        match self {
            Value::Tensor(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Tensor(_) => "tensor",
        }
    }
}

impl From<Tensor> for Value {
    fn from(t: Tensor) -> Self {
        Value::Tensor(t)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "none"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Double(d) => write!(f, "{}", d),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Tensor(t) => {
                let items: Vec<String> = t.data().iter().map(|v| format!("{}", v)).collect();
                write!(f, "tensor{:?}[{}]", t.sizes(), items.join(", "))
            }
        }
    }
}
