use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::inspector::{ObjectId, PropertyDescriptor, PropertyValue, RemoteValue};

/// Property slot of a simulated object.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Value(RemoteValue),
    Getter,
    Throws(String),
}

#[derive(Debug, Clone)]
struct HeapObject {
    class_name: SmolStr,
    array: bool,
    props: IndexMap<String, Slot>,
}

/// Objects of the simulated interpreter. Ids are indices; nothing is freed.
#[derive(Debug, Clone, Default)]
pub struct Heap {
    objects: Vec<HeapObject>,
}

impl Heap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A plain `Object`.
    pub fn object(&mut self) -> RemoteValue {
        self.instance("Object")
    }

    pub fn instance(&mut self, class_name: &str) -> RemoteValue {
        self.alloc(class_name, false, IndexMap::new())
    }

    pub fn array(&mut self, items: Vec<RemoteValue>) -> RemoteValue {
        let props = items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| (idx.to_string(), Slot::Value(item)))
            .collect();
        self.alloc("Array", true, props)
    }

    fn alloc(&mut self, class_name: &str, array: bool, props: IndexMap<String, Slot>) -> RemoteValue {
        let id = ObjectId(self.objects.len() as u64);
        self.objects.push(HeapObject {
            class_name: SmolStr::new(class_name),
            array,
            props,
        });
        self.value(id)
    }

    /// Fresh handle for `id`, with an up-to-date description.
    #[must_use]
    pub fn value(&self, id: ObjectId) -> RemoteValue {
        let (class_name, description) = match self.get_object(id) {
            Some(object) if object.array => (
                object.class_name.clone(),
                format!("Array({})", object.props.len()),
            ),
            Some(object) => (object.class_name.clone(), object.class_name.to_string()),
            None => (SmolStr::new_static("Object"), "Object".to_string()),
        };
        RemoteValue::Object {
            id,
            class_name,
            description,
        }
    }

    pub fn set(&mut self, target: &RemoteValue, name: &str, value: impl Into<RemoteValue>) {
        self.put(target, name, Slot::Value(value.into()));
    }

    /// An accessor property.
    pub fn getter(&mut self, target: &RemoteValue, name: &str) {
        self.put(target, name, Slot::Getter);
    }

    /// A property whose read throws `message`.
    pub fn throwing(&mut self, target: &RemoteValue, name: &str, message: &str) {
        self.put(target, name, Slot::Throws(message.to_string()));
    }

    fn put(&mut self, target: &RemoteValue, name: &str, slot: Slot) {
        let Some(object) = target
            .object_id()
            .and_then(|id| usize::try_from(id.0).ok())
            .and_then(|idx| self.objects.get_mut(idx))
        else {
            return;
        };
        object.props.insert(name.to_string(), slot);
    }

    fn get_object(&self, id: ObjectId) -> Option<&HeapObject> {
        self.objects.get(usize::try_from(id.0).ok()?)
    }

    #[must_use]
    pub fn slot(&self, id: ObjectId, name: &str) -> Option<&Slot> {
        self.get_object(id)?.props.get(name)
    }

    #[must_use]
    pub fn is_array(&self, id: ObjectId) -> bool {
        self.get_object(id).is_some_and(|object| object.array)
    }

    #[must_use]
    pub fn keys(&self, id: ObjectId) -> Vec<String> {
        self.get_object(id)
            .map(|object| object.props.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn properties(&self, id: ObjectId) -> Result<Vec<PropertyDescriptor>, String> {
        let object = self
            .get_object(id)
            .ok_or_else(|| format!("Could not find object with given id {}", id.0))?;
        Ok(object
            .props
            .iter()
            .map(|(name, slot)| PropertyDescriptor {
                name: name.clone(),
                value: match slot {
                    Slot::Value(value) => PropertyValue::Value(value.clone()),
                    Slot::Getter => PropertyValue::Getter,
                    Slot::Throws(message) => PropertyValue::Thrown(message.clone()),
                },
            })
            .collect())
    }
}
