//! Minimal JVM classfile scanner
//!
//! Reads just enough of the classfile format to describe a class's binary
//! name and its declared members (fields and methods with name, descriptor,
//! access flags, and a digest of attribute bytes). That is all member-level
//! classpath snapshots need; code attributes are digested, never decoded.

use sha2::{Digest, Sha256};

use crate::error::{JarError, JarResult};

const MAGIC: u32 = 0xCAFE_BABE;

/// One declared field or method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberSummary {
    pub name: String,
    pub descriptor: String,
    pub access_flags: u16,
    /// SHA-256 over the member's attribute table (names and payloads).
    pub attributes_digest: [u8; 32],
}

impl MemberSummary {
    /// Stable key for this member within its class: `name` + `descriptor`
    /// uniquely identifies a field or method overload.
    pub fn signature(&self) -> String {
        format!("{}{}", self.name, self.descriptor)
    }
}

/// Structural summary of one classfile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassSummary {
    /// Internal binary name, e.g. `com/example/Foo`.
    pub binary_name: String,
    pub access_flags: u16,
    pub members: Vec<MemberSummary>,
}

/// Scan a classfile. `name` is only used in error messages.
pub fn scan(name: &str, bytes: &[u8]) -> JarResult<ClassSummary> {
    let mut cursor = Cursor::new(name, bytes);

    if cursor.read_u32()? != MAGIC {
        return Err(JarError::class_file(name, "bad magic"));
    }
    cursor.read_u16()?; // minor version
    cursor.read_u16()?; // major version

    let pool = ConstantPool::parse(&mut cursor)?;

    let access_flags = cursor.read_u16()?;
    let this_class = cursor.read_u16()?;
    let binary_name = pool.class_name(this_class, name)?;
    cursor.read_u16()?; // super class

    let interface_count = cursor.read_u16()?;
    cursor.skip(interface_count as usize * 2)?;

    let mut members = Vec::new();
    for _ in 0..2 {
        // fields table, then methods table; identical layout
        let count = cursor.read_u16()?;
        for _ in 0..count {
            members.push(read_member(&mut cursor, &pool)?);
        }
    }

    Ok(ClassSummary {
        binary_name,
        access_flags,
        members,
    })
}

fn read_member(cursor: &mut Cursor<'_>, pool: &ConstantPool) -> JarResult<MemberSummary> {
    let access_flags = cursor.read_u16()?;
    let name_index = cursor.read_u16()?;
    let descriptor_index = cursor.read_u16()?;
    let name = pool.utf8(name_index, cursor.name)?.to_owned();
    let descriptor = pool.utf8(descriptor_index, cursor.name)?.to_owned();

    let mut hasher = Sha256::new();
    let attribute_count = cursor.read_u16()?;
    for _ in 0..attribute_count {
        let attr_name_index = cursor.read_u16()?;
        let length = cursor.read_u32()? as usize;
        let payload = cursor.take(length)?;
        hasher.update(pool.utf8(attr_name_index, cursor.name)?.as_bytes());
        hasher.update(payload);
    }

    Ok(MemberSummary {
        name,
        descriptor,
        access_flags,
        attributes_digest: hasher.finalize().into(),
    })
}

/// Constant pool with only the pieces the scanner resolves: Utf8 strings and
/// Class name references. Every other entry kind is sized and skipped.
struct ConstantPool {
    utf8: Vec<Option<String>>,
    classes: Vec<Option<u16>>,
}

impl ConstantPool {
    fn parse(cursor: &mut Cursor<'_>) -> JarResult<Self> {
        let count = cursor.read_u16()? as usize;
        let mut utf8 = vec![None; count];
        let mut classes = vec![None; count];

        let mut index = 1;
        while index < count {
            let tag = cursor.read_u8()?;
            match tag {
                // Utf8
                1 => {
                    let length = cursor.read_u16()? as usize;
                    let bytes = cursor.take(length)?;
                    // Modified UTF-8; lossy is fine for identifier comparison
                    utf8[index] = Some(String::from_utf8_lossy(bytes).into_owned());
                }
                // Integer, Float
                3 | 4 => cursor.skip(4)?,
                // Long, Double occupy two pool slots
                5 | 6 => {
                    cursor.skip(8)?;
                    index += 1;
                }
                // Class
                7 => classes[index] = Some(cursor.read_u16()?),
                // String, MethodType, Module, Package
                8 | 16 | 19 | 20 => cursor.skip(2)?,
                // Fieldref, Methodref, InterfaceMethodref, NameAndType,
                // Dynamic, InvokeDynamic
                9 | 10 | 11 | 12 | 17 | 18 => cursor.skip(4)?,
                // MethodHandle
                15 => cursor.skip(3)?,
                other => {
                    return Err(JarError::class_file(
                        cursor.name,
                        format!("unknown constant pool tag {other} at index {index}"),
                    ))
                }
            }
            index += 1;
        }

        Ok(Self { utf8, classes })
    }

    fn utf8(&self, index: u16, name: &str) -> JarResult<&str> {
        self.utf8
            .get(index as usize)
            .and_then(|s| s.as_deref())
            .ok_or_else(|| {
                JarError::class_file(name, format!("constant #{index} is not a Utf8 entry"))
            })
    }

    fn class_name(&self, index: u16, name: &str) -> JarResult<String> {
        let utf8_index = self
            .classes
            .get(index as usize)
            .and_then(|c| *c)
            .ok_or_else(|| {
                JarError::class_file(name, format!("constant #{index} is not a Class entry"))
            })?;
        Ok(self.utf8(utf8_index, name)?.to_owned())
    }
}

struct Cursor<'a> {
    name: &'a str,
    bytes: &'a [u8],
    position: usize,
}

impl<'a> Cursor<'a> {
    fn new(name: &'a str, bytes: &'a [u8]) -> Self {
        Self {
            name,
            bytes,
            position: 0,
        }
    }

    fn take(&mut self, len: usize) -> JarResult<&'a [u8]> {
        let end = self.position.checked_add(len).filter(|e| *e <= self.bytes.len());
        match end {
            Some(end) => {
                let slice = &self.bytes[self.position..end];
                self.position = end;
                Ok(slice)
            }
            None => Err(JarError::class_file(
                self.name,
                format!("truncated at offset {}", self.position),
            )),
        }
    }

    fn skip(&mut self, len: usize) -> JarResult<()> {
        self.take(len).map(|_| ())
    }

    fn read_u8(&mut self) -> JarResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> JarResult<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn read_u32(&mut self) -> JarResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}
