use std::collections::HashMap;

use crate::domain::entity::product_command::ProductCommand;

/// コミット対象を元の行順を保ったまま batch_size 件ずつに分割する。
pub fn plan_batches(commands: Vec<ProductCommand>, batch_size: usize) -> Vec<Vec<ProductCommand>> {
    let batch_size = batch_size.max(1);
    let mut batches = Vec::with_capacity(commands.len().div_ceil(batch_size));
    let mut current = Vec::with_capacity(batch_size);
    for command in commands {
        current.push(command);
        if current.len() == batch_size {
            batches.push(std::mem::replace(&mut current, Vec::with_capacity(batch_size)));
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

/// どの書き込みキー（商品キー・SKU）も2つ以上のバッチに現れない場合に true。
/// true のときに限りバッチを並列に書き込める。
pub fn batches_are_disjoint(batches: &[Vec<ProductCommand>]) -> bool {
    let mut owner: HashMap<String, usize> = HashMap::new();
    for (index, batch) in batches.iter().enumerate() {
        for command in batch {
            for key in command.write_keys() {
                if let Some(previous) = owner.insert(key, index) {
                    if previous != index {
                        return false;
                    }
                }
            }
        }
    }
    true
}
