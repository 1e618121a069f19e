pub mod lmdb;
