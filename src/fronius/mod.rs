pub mod decoder;
pub mod device;
pub mod packet;
pub mod sanity;
pub mod value;
