pub mod restriction_store_file;
