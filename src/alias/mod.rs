//! Разрешение алиасов по wildcard-шаблонам.
//!
//! Локальное имя (например, код авторитета или имя свойства) отображается в
//! алиас через именованные группы. `*` захватывает любую последовательность
//! символов, `?` ровно один сегмент между точками; захваты подставляются в
//! шаблон алиаса позиционно.

pub mod alias_type;
pub mod pattern;
pub mod registry;

pub use alias_type::AliasType;
pub use pattern::{substitute, WildcardPattern};
pub use registry::{AliasLoadStats, AliasRegistry, PREFIX_DELIM};
