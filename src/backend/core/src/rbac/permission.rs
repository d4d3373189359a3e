//! Closed permission enumerations.
//!
//! Applications declare their permissions once with [`permission_enum!`]:
//!
//! ```rust
//! api_toolkit::permission_enum! {
//!     /// Permissions of the notes service.
//!     pub enum NotesPermission {
//!         NotesRead,
//!         NotesWrite,
//!         NotesDelete,
//!     }
//! }
//!
//! use api_toolkit::rbac::PermissionEnum;
//! assert_eq!(NotesPermission::all().len(), 3);
//! assert_eq!(NotesPermission::NotesWrite.name(), "NotesWrite");
//! assert_eq!(NotesPermission::from_name("NotesRead"), Some(NotesPermission::NotesRead));
//! ```

use std::fmt;
use std::hash::Hash;

/// A finite, exhaustively enumerable set of permission tokens.
///
/// `name` must be unique per value; it doubles as the access-policy name.
pub trait PermissionEnum: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static {
    /// Every value, in declaration order.
    fn all() -> &'static [Self];

    /// Stable name of this value.
    fn name(&self) -> &'static str;

    /// Inverse of [`PermissionEnum::name`].
    fn from_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|p| p.name() == name)
    }
}

/// Declare a fieldless permission enum and implement [`PermissionEnum`] for it.
///
/// Each variant's name is its identifier. Attributes on the enum (extra
/// derives, docs, `serde` options) are passed through.
#[macro_export]
macro_rules! permission_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        $vis enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $crate::rbac::PermissionEnum for $name {
            fn all() -> &'static [Self] {
                &[$(Self::$variant),+]
            }

            fn name(&self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($variant)),+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str($crate::rbac::PermissionEnum::name(self))
            }
        }
    };
}
