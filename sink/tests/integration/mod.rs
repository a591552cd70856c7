mod dead_letter_test;
mod pipeline_test;
mod postgres_store_test;
mod processor_test;
mod reconnect_test;
