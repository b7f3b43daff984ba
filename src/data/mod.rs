pub mod lts;
