pub mod gains_archive;
