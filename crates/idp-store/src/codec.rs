use std::borrow::Cow;

use heed::BoxedError;
use roaring::RoaringBitmap;

/// Big-endian `u32` key codec, so that internal ids sort numerically in LMDB
/// the way `index-scheduler`'s `BEU32` does (there backed by `milli`; here by
/// plain `heed::types::U32` since this workspace does not depend on `milli`).
pub type BEU32 = heed::types::U32<byteorder::BigEndian>;

/// `RoaringBitmap` postings for the multi-valued/disjunctive secondary
/// indexes, grounded on `index-scheduler::queue::tasks::TaskQueue`'s
/// `RoaringBitmapCodec` (there re-exported from `milli`; reimplemented here
/// directly over `roaring`'s own portable serialization).
pub struct RoaringBitmapCodec;

impl<'a> heed::BytesEncode<'a> for RoaringBitmapCodec {
    type EItem = RoaringBitmap;

    fn bytes_encode(item: &'a RoaringBitmap) -> Result<Cow<'a, [u8]>, BoxedError> {
        let mut bytes = Vec::with_capacity(item.serialized_size());
        item.serialize_into(&mut bytes)?;
        Ok(Cow::Owned(bytes))
    }
}

impl<'a> heed::BytesDecode<'a> for RoaringBitmapCodec {
    type DItem = RoaringBitmap;

    fn bytes_decode(bytes: &'a [u8]) -> Result<RoaringBitmap, BoxedError> {
        Ok(RoaringBitmap::deserialize_from(bytes)?)
    }
}
