/// Generates a module with a process-wide pool of reusable object ids.
///
/// Ids identify surfaces, clients and outputs in events and logs. They are released
/// again when the owning object is dropped, so a long running compositor never runs dry.
macro_rules! id_gen {
    ($mod_name:ident) => {
        mod $mod_name {
            use once_cell::sync::Lazy;
            use std::{collections::HashSet, sync::Mutex};

            static ID_DATA: Lazy<Mutex<(HashSet<u32>, u32)>> = Lazy::new(|| Mutex::new((HashSet::new(), 1)));

            pub(crate) fn next() -> u32 {
                let (id_set, counter) = &mut *ID_DATA.lock().unwrap();

                if id_set.len() == u32::MAX as usize {
                    panic!("Out of ids");
                }

                // 0 is never handed out, it stands for the null object on the wire
                while *counter == 0 || !id_set.insert(*counter) {
                    *counter = counter.wrapping_add(1);
                }

                let new_id = *counter;
                *counter = counter.wrapping_add(1);

                new_id
            }

            pub(crate) fn remove(id: u32) -> bool {
                ID_DATA.lock().unwrap().0.remove(&id)
            }
        }
    };
}

pub(crate) use id_gen;
