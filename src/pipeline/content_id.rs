//! `ContentId`: the short-lived message carried between MetaFilter and the
//! hash cascade stages. Grounded on
//! `original_source/workflow/filtering/metafilter.go`'s `ContentId` struct
//! (`checksums string, fileStat FileStat`).

use crate::model::FileStat;

#[derive(Debug, Clone)]
pub struct ContentId {
    pub acc_checksum: String,
    pub fs: FileStat,
}
