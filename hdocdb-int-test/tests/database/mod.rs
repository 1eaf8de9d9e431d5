mod database_test;
