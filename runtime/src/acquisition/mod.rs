//! Network acquisition: the retrying HTTP fetcher shared by every stage of a run.

pub mod http_client;
