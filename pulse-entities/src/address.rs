use crate::id::RecordId;
use thiserror::Error;

/// Maximum number of address components a batch row can carry.
pub const MAX_ADDRESS_COMPONENTS: usize = 4;

/// The postal address of a single row.
///
/// Either one free-form line or up to four positional
/// components. Missing components are empty strings.
#[rustfmt::skip]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressParts {
    FreeForm(String),
    Components {
        street : String,
        city   : String,
        state  : String,
        zip    : String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressShape {
    FreeForm,
    Components,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("An address needs between 1 and {max} components, got {0}", max = MAX_ADDRESS_COMPONENTS)]
pub struct AddressShapeError(pub usize);

impl AddressParts {
    /// Builds the address from the values of the caller's address columns.
    ///
    /// A single column is taken as a free-form address, two to four columns
    /// are mapped onto street, city, state and zip in this order.
    pub fn from_columns<S: AsRef<str>>(columns: &[S]) -> Result<Self, AddressShapeError> {
        let mut values = columns.iter().map(|c| c.as_ref().trim().to_owned());
        match columns.len() {
            1 => Ok(Self::FreeForm(values.next().unwrap_or_default())),
            2..=MAX_ADDRESS_COMPONENTS => Ok(Self::Components {
                street: values.next().unwrap_or_default(),
                city: values.next().unwrap_or_default(),
                state: values.next().unwrap_or_default(),
                zip: values.next().unwrap_or_default(),
            }),
            n => Err(AddressShapeError(n)),
        }
    }

    pub fn shape(&self) -> AddressShape {
        match self {
            Self::FreeForm(_) => AddressShape::FreeForm,
            Self::Components { .. } => AddressShape::Components,
        }
    }

    /// The four address columns of a batch row, blank padded.
    pub fn columns(&self) -> [&str; MAX_ADDRESS_COMPONENTS] {
        match self {
            Self::FreeForm(line) => [line.as_str(), "", "", ""],
            Self::Components {
                street,
                city,
                state,
                zip,
            } => [street.as_str(), city.as_str(), state.as_str(), zip.as_str()],
        }
    }

    pub fn is_blank(&self) -> bool {
        self.columns().iter().all(|c| c.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRecord {
    pub id: RecordId,
    pub parts: AddressParts,
}

impl AddressRecord {
    pub fn new(id: impl Into<RecordId>, parts: AddressParts) -> Self {
        Self {
            id: id.into(),
            parts,
        }
    }

    pub fn free_form(id: impl Into<RecordId>, line: impl Into<String>) -> Self {
        Self::new(id, AddressParts::FreeForm(line.into()))
    }
}
