use bson::spec::BinarySubtype;
use bson::{doc, Bson, Document};
use uuid::Uuid;

/// Ids are stored as BSON binary (subtype 4), filters must match that.
#[inline]
pub fn uuid(id: Uuid) -> Bson {
    Bson::Binary(bson::Binary {
        subtype: BinarySubtype::Uuid,
        bytes: id.as_bytes().to_vec(),
    })
}

#[inline]
pub fn uuids(ids: &[Uuid]) -> Bson {
    Bson::Array(ids.iter().copied().map(uuid).collect())
}

#[inline]
pub fn by_id(id: Uuid) -> Document {
    doc! { "_id": uuid(id) }
}

#[inline]
pub fn by_username(username: impl Into<String>) -> Document {
    let username: String = username.into();
    doc! { "username": username }
}

#[inline]
pub fn by_student(student: impl Into<String>) -> Document {
    let student: String = student.into();
    doc! { "student": student }
}

#[inline]
pub fn by_course(course: Uuid) -> Document {
    doc! { "course": uuid(course) }
}
