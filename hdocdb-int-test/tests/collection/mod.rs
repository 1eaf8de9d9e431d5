mod conditional_write_test;
mod crud_test;
mod find_by_index_test;
mod index_lifecycle_test;
mod mutation_test;
mod projection_test;
mod stale_index_test;
