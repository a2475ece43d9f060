pub(crate) mod meta;
pub(crate) mod serve;
pub(crate) mod shared;
pub(crate) mod sync;
pub(crate) mod theme;
