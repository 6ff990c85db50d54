pub mod job_analyzer;
