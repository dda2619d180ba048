pub mod kill;
pub mod notify;
pub mod privileges;
pub mod signals;
pub mod spawn;
