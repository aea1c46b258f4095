pub mod virus_scan;
