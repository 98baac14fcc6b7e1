pub mod csv_writer;
pub mod labels;
pub mod summary;
pub mod thermo_scan;
