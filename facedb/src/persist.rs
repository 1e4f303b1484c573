use std::io::{BufReader, BufWriter, Read, Write};

use serde::{Deserialize, Serialize};

use crate::cache::CentroidCache;
use crate::store::{EmbeddingStore, Identity};
use crate::types::FaceSample;
use crate::FaceDbError;

const FACEDB_MAGIC: [u8; 4] = *b"FCDB";
const FACEDB_VERSION: u32 = 1;

/// Borrowed view written by [`save`].
#[derive(Serialize)]
struct SnapshotRef<'a> {
    identities: &'a [Identity],
    unknown: &'a [FaceSample],
    cache: Option<&'a CentroidCache>,
}

#[derive(Deserialize)]
struct SnapshotOwned {
    identities: Vec<Identity>,
    #[serde(default)]
    unknown: Vec<FaceSample>,
    #[serde(default)]
    cache: Option<CentroidCache>,
}

/// A fully decoded and validated database file.
#[derive(Debug)]
pub(crate) struct Loaded {
    pub store: EmbeddingStore,
    pub unknown: Vec<FaceSample>,
    pub cache: Option<CentroidCache>,
}

/// Writes the store, pending unknown faces and (if given) the cache.
///
/// ```text
/// [4B magic "FCDB"] [4B version=1, little-endian]
/// [MessagePack map, named fields]:
///   identities: [{ name, samples: [{ embedding[128], rect, image_id }] }]
///   unknown:    [sample]
///   cache:      nil | { normalizer: { mean, inv_std },
///                       entries: [{ name, centroid: { gamma, dictionary, alpha, bias } }] }
/// ```
///
/// Samples inside an identity omit their name; it is restored from the
/// identity on load.
pub(crate) fn save(
    w: &mut dyn Write,
    store: &EmbeddingStore,
    unknown: &[FaceSample],
    cache: Option<&CentroidCache>,
) -> Result<(), FaceDbError> {
    let mut bw = BufWriter::new(w);
    bw.write_all(&FACEDB_MAGIC)?;
    bw.write_all(&FACEDB_VERSION.to_le_bytes())?;

    let identities: Vec<Identity> = store
        .identities()
        .iter()
        .map(|i| Identity {
            name: i.name.clone(),
            samples: i
                .samples
                .iter()
                .map(|s| FaceSample {
                    name: String::new(),
                    ..s.clone()
                })
                .collect(),
        })
        .collect();

    let snap = SnapshotRef {
        identities: &identities,
        unknown,
        cache,
    };
    rmp_serde::encode::write_named(&mut bw, &snap)
        .map_err(|e| FaceDbError::Encode(e.to_string()))?;
    bw.flush()?;
    Ok(())
}

/// Reads what [`save`] wrote. Nothing is trusted: duplicate identity names
/// fail the load, and a cache whose shape does not fit the embedding
/// dimension is dropped.
pub(crate) fn load(r: &mut dyn Read) -> Result<Loaded, FaceDbError> {
    let mut br = BufReader::new(r);
    let mut buf4 = [0u8; 4];

    br.read_exact(&mut buf4)
        .map_err(|e| FaceDbError::InvalidFormat(format!("reading magic: {e}")))?;
    if buf4 != FACEDB_MAGIC {
        return Err(FaceDbError::InvalidFormat(format!("invalid magic {buf4:?}")));
    }

    br.read_exact(&mut buf4)
        .map_err(|e| FaceDbError::InvalidFormat(format!("reading version: {e}")))?;
    let version = u32::from_le_bytes(buf4);
    if version != FACEDB_VERSION {
        return Err(FaceDbError::UnsupportedVersion {
            got: version,
            want: FACEDB_VERSION,
        });
    }

    let snap: SnapshotOwned =
        rmp_serde::from_read(&mut br).map_err(|e| FaceDbError::Decode(e.to_string()))?;

    let store = EmbeddingStore::from_identities(snap.identities)?;
    let cache = snap.cache.filter(CentroidCache::is_well_formed);

    Ok(Loaded {
        store,
        unknown: snap.unknown,
        cache,
    })
}
