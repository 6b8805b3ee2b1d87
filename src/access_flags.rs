//! Access-flag bit sets and the views derived from them
//!
//! The class-file format stores access information as one `u16` per class,
//! per field, per method, and per `InnerClasses` entry, and each of those
//! four positions assigns its own meaning to the bits. The `bitflags!` sets
//! below name the bits the model reads; the numeric values are fixed by the
//! format and shared with every other JVM tool. The low three visibility
//! bits mean the same thing everywhere, which is what [`Visibility`] decodes.

use bitflags::bitflags;

bitflags! {
    /// The class-level flag word
    ///
    /// `SUPER` and `MODULE` are carried only so decoded values survive
    /// untouched; the model never consults them.
    pub struct ClassAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const FINAL = 0x0010;
        const SUPER = 0x0020;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
        const MODULE = 0x8000;
    }
}

bitflags! {
    /// The flag word of one method
    ///
    /// `BRIDGE` + `SYNTHETIC` together mark the compiler-generated
    /// forwarders the bridge hydrator resolves.
    pub struct MethodAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SYNCHRONIZED = 0x0020;
        const BRIDGE = 0x0040;
        const VARARGS = 0x0080;
        const NATIVE = 0x0100;
        const ABSTRACT = 0x0400;
        const STRICT = 0x0800;
        const SYNTHETIC = 0x1000;
    }
}

bitflags! {
    /// The flag word of one field
    pub struct FieldAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const VOLATILE = 0x0040;
        const TRANSIENT = 0x0080;
        const SYNTHETIC = 0x1000;
        const ENUM = 0x4000;
    }
}

bitflags! {
    /// The flag word of one `InnerClasses` entry
    ///
    /// These describe the nested class as its enclosing class sees it, so
    /// `STATIC` appears here even though no class-level bit exists for it.
    /// The static-inner heuristic reads `STATIC` and `ENUM` off this word.
    pub struct InnerClassAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
    }
}

bitflags! {
    /// The kind set of a class: a nonempty subset of these bits
    ///
    /// A class with no modifier bit set is a plain `CLASS`. Records carry no
    /// access-flag bit; they are recognized from the record attribute.
    pub struct ClassKinds: u8 {
        const CLASS = 0x01;
        const ABSTRACT_CLASS = 0x02;
        const INTERFACE = 0x04;
        const ANNOTATION = 0x08;
        const ENUM = 0x10;
        const RECORD = 0x20;
    }
}

impl ClassKinds {
    pub fn from_flags(flags: ClassAccessFlags, is_record: bool) -> ClassKinds {
        let mut kinds = ClassKinds::empty();
        if flags.contains(ClassAccessFlags::ANNOTATION) {
            kinds |= ClassKinds::ANNOTATION;
        }
        if flags.contains(ClassAccessFlags::INTERFACE) {
            kinds |= ClassKinds::INTERFACE;
        }
        if flags.contains(ClassAccessFlags::ENUM) {
            kinds |= ClassKinds::ENUM;
        }
        if is_record {
            kinds |= ClassKinds::RECORD;
        }
        if kinds.is_empty() {
            kinds |= if flags.contains(ClassAccessFlags::ABSTRACT) {
                ClassKinds::ABSTRACT_CLASS
            } else {
                ClassKinds::CLASS
            };
        }
        kinds
    }
}

/// Member and class visibility, decoded from the low access-flag bits
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Visibility {
    Public,
    Protected,
    Package,
    Private,
}

impl Visibility {
    /// The PUBLIC/PRIVATE/PROTECTED bits share values across all flag kinds
    pub fn from_bits(bits: u16) -> Visibility {
        if bits & 0x0001 != 0 {
            Visibility::Public
        } else if bits & 0x0002 != 0 {
            Visibility::Private
        } else if bits & 0x0004 != 0 {
            Visibility::Protected
        } else {
            Visibility::Package
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn plain_class_kind() {
        let kinds = ClassKinds::from_flags(ClassAccessFlags::PUBLIC, false);
        assert_eq!(kinds, ClassKinds::CLASS);
    }

    #[test]
    fn abstract_and_interface_kinds() {
        let kinds = ClassKinds::from_flags(
            ClassAccessFlags::PUBLIC | ClassAccessFlags::ABSTRACT,
            false,
        );
        assert_eq!(kinds, ClassKinds::ABSTRACT_CLASS);

        let kinds = ClassKinds::from_flags(
            ClassAccessFlags::INTERFACE | ClassAccessFlags::ABSTRACT,
            false,
        );
        assert_eq!(kinds, ClassKinds::INTERFACE);
    }

    #[test]
    fn record_kind_comes_from_the_attribute() {
        let kinds = ClassKinds::from_flags(ClassAccessFlags::FINAL, true);
        assert_eq!(kinds, ClassKinds::RECORD);
    }

    #[test]
    fn visibility_bits() {
        assert_eq!(Visibility::from_bits(0x0001), Visibility::Public);
        assert_eq!(Visibility::from_bits(0x0002), Visibility::Private);
        assert_eq!(Visibility::from_bits(0x0004), Visibility::Protected);
        assert_eq!(Visibility::from_bits(0x0008), Visibility::Package);
    }
}
