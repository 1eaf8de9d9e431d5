mod fault_injection_test;
mod multi_threaded_test;
