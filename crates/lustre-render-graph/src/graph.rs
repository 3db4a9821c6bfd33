//! 依赖分析与拓扑排序
//!
//! 从 pass 的读写集合推导 RAW/WAW/WAR 依赖，Kahn 算法排序，
//! 检测到循环时返回参与循环的 pass。

use std::collections::{HashMap, VecDeque};

use crate::handle::{RgBufferHandle, RgImageHandle};

pub struct DependencyGraph {
    pass_count: usize,
    /// 邻接表（出边）
    adjacency: Vec<Vec<usize>>,
    in_degrees: Vec<usize>,
}

impl DependencyGraph {
    pub fn new(pass_count: usize) -> Self {
        Self {
            pass_count,
            adjacency: vec![Vec::new(); pass_count],
            in_degrees: vec![0; pass_count],
        }
    }

    pub fn add_edge(&mut self, producer: usize, consumer: usize) {
        if producer == consumer {
            return;
        }
        if !self.adjacency[producer].contains(&consumer) {
            self.adjacency[producer].push(consumer);
            self.in_degrees[consumer] += 1;
        }
    }

    /// Kahn 拓扑排序
    ///
    /// 队列按 pass 添加顺序出队，无依赖时保持声明顺序。
    /// 检测到循环时返回 `Err(参与循环的 pass 索引)`。
    pub fn topological_sort(&self) -> Result<Vec<usize>, Vec<usize>> {
        let mut in_degrees = self.in_degrees.clone();
        let mut queue = VecDeque::new();
        let mut result = Vec::with_capacity(self.pass_count);

        for i in 0..self.pass_count {
            if in_degrees[i] == 0 {
                queue.push_back(i);
            }
        }

        while let Some(node) = queue.pop_front() {
            result.push(node);

            for &neighbor in &self.adjacency[node] {
                in_degrees[neighbor] -= 1;
                if in_degrees[neighbor] == 0 {
                    queue.push_back(neighbor);
                }
            }
        }

        if result.len() != self.pass_count {
            let remaining = (0..self.pass_count).filter(|&i| in_degrees[i] > 0).collect();
            Err(remaining)
        } else {
            Ok(result)
        }
    }

    /// 依赖规则：
    /// - RAW：reader 依赖最后一个 writer
    /// - WAW：后一个 writer 依赖前一个 writer
    /// - WAR：writer 依赖上次写入之后的所有 reader
    pub fn analyze(
        pass_count: usize,
        image_reads: &[Vec<RgImageHandle>],
        image_writes: &[Vec<RgImageHandle>],
        buffer_reads: &[Vec<RgBufferHandle>],
        buffer_writes: &[Vec<RgBufferHandle>],
    ) -> Self {
        let mut graph = Self::new(pass_count);

        let mut last_image_writer: HashMap<RgImageHandle, usize> = HashMap::new();
        let mut last_buffer_writer: HashMap<RgBufferHandle, usize> = HashMap::new();
        let mut image_readers_since_write: HashMap<RgImageHandle, Vec<usize>> = HashMap::new();
        let mut buffer_readers_since_write: HashMap<RgBufferHandle, Vec<usize>> = HashMap::new();

        for pass_idx in 0..pass_count {
            for &handle in &image_reads[pass_idx] {
                if let Some(&writer) = last_image_writer.get(&handle) {
                    graph.add_edge(writer, pass_idx);
                }
                image_readers_since_write.entry(handle).or_default().push(pass_idx);
            }

            for &handle in &image_writes[pass_idx] {
                if let Some(&prev_writer) = last_image_writer.get(&handle) {
                    graph.add_edge(prev_writer, pass_idx);
                }
                if let Some(readers) = image_readers_since_write.get(&handle) {
                    for &reader in readers {
                        graph.add_edge(reader, pass_idx);
                    }
                }
                last_image_writer.insert(handle, pass_idx);
                image_readers_since_write.insert(handle, Vec::new());
            }

            for &handle in &buffer_reads[pass_idx] {
                if let Some(&writer) = last_buffer_writer.get(&handle) {
                    graph.add_edge(writer, pass_idx);
                }
                buffer_readers_since_write.entry(handle).or_default().push(pass_idx);
            }

            for &handle in &buffer_writes[pass_idx] {
                if let Some(&prev_writer) = last_buffer_writer.get(&handle) {
                    graph.add_edge(prev_writer, pass_idx);
                }
                if let Some(readers) = buffer_readers_since_write.get(&handle) {
                    for &reader in readers {
                        graph.add_edge(reader, pass_idx);
                    }
                }
                last_buffer_writer.insert(handle, pass_idx);
                buffer_readers_since_write.insert(handle, Vec::new());
            }
        }

        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn image_handles(count: usize) -> Vec<RgImageHandle> {
        let mut map: SlotMap<RgImageHandle, ()> = SlotMap::with_key();
        (0..count).map(|_| map.insert(())).collect()
    }

    #[test]
    fn simple_write_then_read() {
        let h = image_handles(1);
        let image_reads = vec![vec![], vec![h[0]]];
        let image_writes = vec![vec![h[0]], vec![]];

        let graph = DependencyGraph::analyze(2, &image_reads, &image_writes, &[vec![], vec![]], &[vec![], vec![]]);
        assert_eq!(graph.topological_sort().unwrap(), vec![0, 1]);
    }

    #[test]
    fn chain_dependency() {
        let h = image_handles(2);
        let image_reads = vec![vec![], vec![h[0]], vec![h[1]]];
        let image_writes = vec![vec![h[0]], vec![h[1]], vec![]];
        let empty = vec![vec![], vec![], vec![]];

        let graph = DependencyGraph::analyze(3, &image_reads, &image_writes, &empty, &empty);
        assert_eq!(graph.topological_sort().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn parallel_passes_keep_declaration_order() {
        // pass 0 和 pass 1 无依赖，pass 2 读取两者
        let h = image_handles(2);
        let image_reads = vec![vec![], vec![], vec![h[0], h[1]]];
        let image_writes = vec![vec![h[0]], vec![h[1]], vec![]];
        let empty = vec![vec![], vec![], vec![]];

        let graph = DependencyGraph::analyze(3, &image_reads, &image_writes, &empty, &empty);
        let order = graph.topological_sort().unwrap();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn war_orders_reader_before_writer() {
        // pass 0 读 image，pass 1 写同一 image，必须先读后写
        let h = image_handles(1);
        let image_reads = vec![vec![h[0]], vec![]];
        let image_writes = vec![vec![], vec![h[0]]];

        let graph = DependencyGraph::analyze(2, &image_reads, &image_writes, &[vec![], vec![]], &[vec![], vec![]]);
        assert_eq!(graph.topological_sort().unwrap(), vec![0, 1]);
    }

    #[test]
    fn cycle_is_reported() {
        let mut graph = DependencyGraph::new(2);
        graph.add_edge(0, 1);
        graph.add_edge(1, 0);

        let cycle = graph.topological_sort().unwrap_err();
        assert_eq!(cycle, vec![0, 1]);
    }
}
