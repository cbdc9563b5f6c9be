//! Typed arrays for repeated field storage.
//!
//! A [`PbArray`] is an immutable, reference-counted sequence whose elements
//! all share one [`ArrayValueType`]. Primitive kinds are stored unboxed in
//! contiguous memory; the `Object` kind stores shared trait objects (strings,
//! byte runs, sub-messages). Every accessor checks both the index and the
//! element kind.
//!
//! [`AppendableArray`] is the growable variant used while a record is being
//! built or parsed. It offers the same read accessors; [`AppendableArray::freeze`]
//! turns it into a [`PbArray`] once it is handed to a built record.

use crate::error::{Error, Result};
use std::any::Any;
use std::fmt::Debug;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Element kind of a typed array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayValueType {
    /// `bool` elements
    Bool,
    /// `i32` elements (int32, sint32, sfixed32, enum)
    Int32,
    /// `u32` elements (uint32, fixed32)
    UInt32,
    /// `i64` elements (int64, sint64, sfixed64)
    Int64,
    /// `u64` elements (uint64, fixed64)
    UInt64,
    /// `f32` elements
    Float,
    /// `f64` elements
    Double,
    /// Shared object elements
    Object,
}

/// An element stored in an `Object` array.
///
/// Implemented for every `PartialEq + Hash + Debug + Send + Sync` type so
/// that strings, `Bytes` and records can be stored without wrappers.
pub trait ArrayObject: Any + Debug + Send + Sync {
    /// Upcast used for downcasting to the concrete element type.
    fn as_any(&self) -> &dyn Any;

    /// Equality across erased element types; different types never compare equal.
    fn dyn_eq(&self, other: &dyn ArrayObject) -> bool;

    /// Feeds the element into `state` as its own `Hash` impl would.
    fn dyn_hash(&self, state: &mut dyn Hasher);
}

impl<T> ArrayObject for T
where
    T: Any + Debug + PartialEq + Hash + Send + Sync,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn ArrayObject) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .map_or(false, |other| self == other)
    }

    fn dyn_hash(&self, mut state: &mut dyn Hasher) {
        self.hash(&mut state);
    }
}

#[derive(Debug, Clone)]
enum ArrayData {
    Bool(Vec<bool>),
    Int32(Vec<i32>),
    UInt32(Vec<u32>),
    Int64(Vec<i64>),
    UInt64(Vec<u64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    Object(Vec<Arc<dyn ArrayObject>>),
}

impl ArrayData {
    fn empty(value_type: ArrayValueType, capacity: usize) -> Self {
        match value_type {
            ArrayValueType::Bool => ArrayData::Bool(Vec::with_capacity(capacity)),
            ArrayValueType::Int32 => ArrayData::Int32(Vec::with_capacity(capacity)),
            ArrayValueType::UInt32 => ArrayData::UInt32(Vec::with_capacity(capacity)),
            ArrayValueType::Int64 => ArrayData::Int64(Vec::with_capacity(capacity)),
            ArrayValueType::UInt64 => ArrayData::UInt64(Vec::with_capacity(capacity)),
            ArrayValueType::Float => ArrayData::Float(Vec::with_capacity(capacity)),
            ArrayValueType::Double => ArrayData::Double(Vec::with_capacity(capacity)),
            ArrayValueType::Object => ArrayData::Object(Vec::with_capacity(capacity)),
        }
    }

    fn value_type(&self) -> ArrayValueType {
        match self {
            ArrayData::Bool(_) => ArrayValueType::Bool,
            ArrayData::Int32(_) => ArrayValueType::Int32,
            ArrayData::UInt32(_) => ArrayValueType::UInt32,
            ArrayData::Int64(_) => ArrayValueType::Int64,
            ArrayData::UInt64(_) => ArrayValueType::UInt64,
            ArrayData::Float(_) => ArrayValueType::Float,
            ArrayData::Double(_) => ArrayValueType::Double,
            ArrayData::Object(_) => ArrayValueType::Object,
        }
    }

    fn count(&self) -> usize {
        match self {
            ArrayData::Bool(v) => v.len(),
            ArrayData::Int32(v) => v.len(),
            ArrayData::UInt32(v) => v.len(),
            ArrayData::Int64(v) => v.len(),
            ArrayData::UInt64(v) => v.len(),
            ArrayData::Float(v) => v.len(),
            ArrayData::Double(v) => v.len(),
            ArrayData::Object(v) => v.len(),
        }
    }

    fn as_slice(&self) -> ArraySlice<'_> {
        match self {
            ArrayData::Bool(v) => ArraySlice::Bool(v),
            ArrayData::Int32(v) => ArraySlice::Int32(v),
            ArrayData::UInt32(v) => ArraySlice::UInt32(v),
            ArrayData::Int64(v) => ArraySlice::Int64(v),
            ArrayData::UInt64(v) => ArraySlice::UInt64(v),
            ArrayData::Float(v) => ArraySlice::Float(v),
            ArrayData::Double(v) => ArraySlice::Double(v),
            ArrayData::Object(v) => ArraySlice::Object(v),
        }
    }

    fn mismatch(&self, expected: ArrayValueType) -> Error {
        Error::ArrayTypeMismatch {
            expected,
            actual: self.value_type(),
        }
    }

    fn append(&mut self, other: &ArrayData) -> Result<()> {
        match (self, other) {
            (ArrayData::Bool(a), ArrayData::Bool(b)) => a.extend_from_slice(b),
            (ArrayData::Int32(a), ArrayData::Int32(b)) => a.extend_from_slice(b),
            (ArrayData::UInt32(a), ArrayData::UInt32(b)) => a.extend_from_slice(b),
            (ArrayData::Int64(a), ArrayData::Int64(b)) => a.extend_from_slice(b),
            (ArrayData::UInt64(a), ArrayData::UInt64(b)) => a.extend_from_slice(b),
            (ArrayData::Float(a), ArrayData::Float(b)) => a.extend_from_slice(b),
            (ArrayData::Double(a), ArrayData::Double(b)) => a.extend_from_slice(b),
            (ArrayData::Object(a), ArrayData::Object(b)) => a.extend(b.iter().cloned()),
            (this, other) => return Err(other.mismatch(this.value_type())),
        }
        Ok(())
    }
}

/// Borrowed view of a typed array's elements, tagged with their kind.
///
/// Obtained from [`PbArray::as_slice`] or [`AppendableArray::as_slice`];
/// lets code that only reads handle both array types alike.
#[derive(Debug, Clone, Copy)]
pub enum ArraySlice<'a> {
    /// `bool` elements
    Bool(&'a [bool]),
    /// `i32` elements
    Int32(&'a [i32]),
    /// `u32` elements
    UInt32(&'a [u32]),
    /// `i64` elements
    Int64(&'a [i64]),
    /// `u64` elements
    UInt64(&'a [u64]),
    /// `f32` elements
    Float(&'a [f32]),
    /// `f64` elements
    Double(&'a [f64]),
    /// Shared object elements
    Object(&'a [Arc<dyn ArrayObject>]),
}

impl ArraySlice<'_> {
    /// Element kind.
    pub fn value_type(&self) -> ArrayValueType {
        match self {
            ArraySlice::Bool(_) => ArrayValueType::Bool,
            ArraySlice::Int32(_) => ArrayValueType::Int32,
            ArraySlice::UInt32(_) => ArrayValueType::UInt32,
            ArraySlice::Int64(_) => ArrayValueType::Int64,
            ArraySlice::UInt64(_) => ArrayValueType::UInt64,
            ArraySlice::Float(_) => ArrayValueType::Float,
            ArraySlice::Double(_) => ArrayValueType::Double,
            ArraySlice::Object(_) => ArrayValueType::Object,
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            ArraySlice::Bool(v) => v.len(),
            ArraySlice::Int32(v) => v.len(),
            ArraySlice::UInt32(v) => v.len(),
            ArraySlice::Int64(v) => v.len(),
            ArraySlice::UInt64(v) => v.len(),
            ArraySlice::Float(v) => v.len(),
            ArraySlice::Double(v) => v.len(),
            ArraySlice::Object(v) => v.len(),
        }
    }

    /// Returns true if there are no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// Float elements compare by bit pattern so equality stays consistent with Hash.
impl PartialEq for ArrayData {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ArrayData::Bool(a), ArrayData::Bool(b)) => a == b,
            (ArrayData::Int32(a), ArrayData::Int32(b)) => a == b,
            (ArrayData::UInt32(a), ArrayData::UInt32(b)) => a == b,
            (ArrayData::Int64(a), ArrayData::Int64(b)) => a == b,
            (ArrayData::UInt64(a), ArrayData::UInt64(b)) => a == b,
            (ArrayData::Float(a), ArrayData::Float(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            (ArrayData::Double(a), ArrayData::Double(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            (ArrayData::Object(a), ArrayData::Object(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.dyn_eq(y.as_ref()))
            }
            _ => false,
        }
    }
}

impl Eq for ArrayData {}

impl Hash for ArrayData {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value_type().hash(state);
        match self {
            ArrayData::Bool(v) => v.hash(state),
            ArrayData::Int32(v) => v.hash(state),
            ArrayData::UInt32(v) => v.hash(state),
            ArrayData::Int64(v) => v.hash(state),
            ArrayData::UInt64(v) => v.hash(state),
            ArrayData::Float(v) => v.iter().for_each(|x| x.to_bits().hash(state)),
            ArrayData::Double(v) => v.iter().for_each(|x| x.to_bits().hash(state)),
            ArrayData::Object(v) => {
                v.len().hash(state);
                for x in v {
                    x.dyn_hash(state);
                }
            }
        }
    }
}

macro_rules! read_accessors {
    ($($(#[$doc:meta])* $at:ident, $slice:ident => $variant:ident($ty:ty);)*) => {
        $(
            $(#[$doc])*
            pub fn $at(&self, index: usize) -> Result<$ty> {
                match self.data() {
                    ArrayData::$variant(values) => values.get(index).copied().ok_or(
                        Error::ArrayIndexOutOfBounds {
                            index,
                            count: values.len(),
                        },
                    ),
                    other => Err(other.mismatch(ArrayValueType::$variant)),
                }
            }

            /// Contiguous view of the elements.
            pub fn $slice(&self) -> Result<&[$ty]> {
                match self.data() {
                    ArrayData::$variant(values) => Ok(values),
                    other => Err(other.mismatch(ArrayValueType::$variant)),
                }
            }
        )*

        /// Element kind fixed at construction.
        pub fn value_type(&self) -> ArrayValueType {
            self.data().value_type()
        }

        /// Number of elements.
        pub fn count(&self) -> usize {
            self.data().count()
        }

        /// Returns true if the array holds no elements.
        pub fn is_empty(&self) -> bool {
            self.count() == 0
        }

        /// Borrowed view of all elements.
        pub fn as_slice(&self) -> ArraySlice<'_> {
            self.data().as_slice()
        }

        /// Object element at `index`.
        pub fn object_at(&self, index: usize) -> Result<&dyn ArrayObject> {
            match self.data() {
                ArrayData::Object(values) => values
                    .get(index)
                    .map(|v| v.as_ref())
                    .ok_or(Error::ArrayIndexOutOfBounds {
                        index,
                        count: values.len(),
                    }),
                other => Err(other.mismatch(ArrayValueType::Object)),
            }
        }

        /// Object element at `index` downcast to its concrete type.
        pub fn downcast_at<T: ArrayObject>(&self, index: usize) -> Result<&T> {
            self.object_at(index)?
                .as_any()
                .downcast_ref::<T>()
                .ok_or(Error::ArrayTypeMismatch {
                    expected: ArrayValueType::Object,
                    actual: ArrayValueType::Object,
                })
        }

        /// All object elements downcast to `T`.
        pub fn objects_as<T: ArrayObject>(&self) -> Result<Vec<&T>> {
            (0..self.count()).map(|i| self.downcast_at::<T>(i)).collect()
        }
    };
}

/// Immutable, reference-counted typed array.
///
/// Cloning shares the underlying storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PbArray {
    data: Arc<ArrayData>,
}

impl PbArray {
    /// Creates an empty array of the given kind.
    pub fn empty(value_type: ArrayValueType) -> Self {
        Self {
            data: Arc::new(ArrayData::empty(value_type, 0)),
        }
    }

    /// Creates an object array from a collection.
    pub fn from_objects<T: ArrayObject>(values: impl IntoIterator<Item = T>) -> Self {
        Self {
            data: Arc::new(ArrayData::Object(
                values
                    .into_iter()
                    .map(|v| Arc::new(v) as Arc<dyn ArrayObject>)
                    .collect(),
            )),
        }
    }

    fn data(&self) -> &ArrayData {
        &self.data
    }

    read_accessors! {
        /// `bool` element at `index`.
        bool_at, as_bool_slice => Bool(bool);
        /// `i32` element at `index`.
        int32_at, as_int32_slice => Int32(i32);
        /// `u32` element at `index`.
        uint32_at, as_uint32_slice => UInt32(u32);
        /// `i64` element at `index`.
        int64_at, as_int64_slice => Int64(i64);
        /// `u64` element at `index`.
        uint64_at, as_uint64_slice => UInt64(u64);
        /// `f32` element at `index`.
        float_at, as_float_slice => Float(f32);
        /// `f64` element at `index`.
        double_at, as_double_slice => Double(f64);
    }
}

macro_rules! impl_from_vec {
    ($($ty:ty => $variant:ident),*) => {
        $(
            impl From<Vec<$ty>> for PbArray {
                fn from(values: Vec<$ty>) -> Self {
                    Self { data: Arc::new(ArrayData::$variant(values)) }
                }
            }
        )*
    };
}

impl_from_vec!(
    bool => Bool,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Float,
    f64 => Double
);

/// Growable typed array.
///
/// Pushing an element of the wrong kind fails with
/// [`Error::ArrayTypeMismatch`] and leaves the array unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppendableArray {
    data: ArrayData,
}

macro_rules! push_methods {
    ($($(#[$doc:meta])* $push:ident => $variant:ident($ty:ty);)*) => {
        $(
            $(#[$doc])*
            pub fn $push(&mut self, value: $ty) -> Result<()> {
                match &mut self.data {
                    ArrayData::$variant(values) => {
                        values.push(value);
                        Ok(())
                    }
                    other => Err(other.mismatch(ArrayValueType::$variant)),
                }
            }
        )*
    };
}

impl AppendableArray {
    /// Creates an empty appendable array of the given kind.
    pub fn new(value_type: ArrayValueType) -> Self {
        Self::with_capacity(value_type, 0)
    }

    /// Creates an empty appendable array with room for `capacity` elements.
    pub fn with_capacity(value_type: ArrayValueType, capacity: usize) -> Self {
        Self {
            data: ArrayData::empty(value_type, capacity),
        }
    }

    /// Copies an immutable array into a new appendable one.
    pub fn from_array(array: &PbArray) -> Self {
        Self {
            data: (*array.data).clone(),
        }
    }

    fn data(&self) -> &ArrayData {
        &self.data
    }

    push_methods! {
        /// Appends a `bool`.
        push_bool => Bool(bool);
        /// Appends an `i32`.
        push_int32 => Int32(i32);
        /// Appends a `u32`.
        push_uint32 => UInt32(u32);
        /// Appends an `i64`.
        push_int64 => Int64(i64);
        /// Appends a `u64`.
        push_uint64 => UInt64(u64);
        /// Appends an `f32`.
        push_float => Float(f32);
        /// Appends an `f64`.
        push_double => Double(f64);
    }

    /// Appends an object element.
    pub fn push_object<T: ArrayObject>(&mut self, value: T) -> Result<()> {
        self.push_shared(Arc::new(value))
    }

    /// Appends an already shared object element.
    pub fn push_shared(&mut self, value: Arc<dyn ArrayObject>) -> Result<()> {
        match &mut self.data {
            ArrayData::Object(values) => {
                values.push(value);
                Ok(())
            }
            other => Err(other.mismatch(ArrayValueType::Object)),
        }
    }

    /// Appends every element of `other`, which must have the same kind.
    pub fn append_array(&mut self, other: &PbArray) -> Result<()> {
        self.data.append(&other.data)
    }

    /// Appends every element of another appendable array.
    pub fn append(&mut self, other: &AppendableArray) -> Result<()> {
        self.data.append(&other.data)
    }

    /// Removes all elements, keeping the kind.
    pub fn clear(&mut self) {
        self.data = ArrayData::empty(self.value_type(), 0);
    }

    /// Snapshot of the current contents as an immutable array.
    pub fn to_array(&self) -> PbArray {
        PbArray {
            data: Arc::new(self.data.clone()),
        }
    }

    /// Converts into an immutable array without copying.
    pub fn freeze(self) -> PbArray {
        PbArray {
            data: Arc::new(self.data),
        }
    }

    read_accessors! {
        /// `bool` element at `index`.
        bool_at, as_bool_slice => Bool(bool);
        /// `i32` element at `index`.
        int32_at, as_int32_slice => Int32(i32);
        /// `u32` element at `index`.
        uint32_at, as_uint32_slice => UInt32(u32);
        /// `i64` element at `index`.
        int64_at, as_int64_slice => Int64(i64);
        /// `u64` element at `index`.
        uint64_at, as_uint64_slice => UInt64(u64);
        /// `f32` element at `index`.
        float_at, as_float_slice => Float(f32);
        /// `f64` element at `index`.
        double_at, as_double_slice => Double(f64);
    }
}
