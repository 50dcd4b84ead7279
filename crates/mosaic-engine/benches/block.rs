use criterion::{Criterion, criterion_group, criterion_main};
use serde_json::{Value, json};

use mosaic_engine::{
    Block, BlockOptions, BlockTool, Dom, MUTATION_DEBOUNCE_TICKS, NodeId, Scheduler,
    ToolDescriptor, TuneDescriptor,
};

struct BenchTool {
    text: String,
    root: Option<NodeId>,
}

impl BlockTool for BenchTool {
    fn render(&mut self, dom: &mut Dom) -> NodeId {
        let root = dom.create_element("div");
        dom.set_attribute(root, "contenteditable", "true");
        let text = dom.create_text(&self.text);
        dom.append_child(root, text);
        self.root = Some(root);
        root
    }

    fn save(&self, dom: &Dom) -> anyhow::Result<Value> {
        let text = self
            .root
            .map(|node| dom.text_content(node))
            .unwrap_or_default();
        Ok(json!({ "text": text }))
    }
}

fn bench_descriptor() -> ToolDescriptor {
    ToolDescriptor::new("bench", |data, _api, _read_only| {
        Ok(Box::new(BenchTool {
            text: data["text"].as_str().unwrap_or("").to_string(),
            root: None,
        }) as Box<dyn BlockTool>)
    })
}

fn wrapper_tune(name: &str) -> TuneDescriptor {
    struct PassTune;
    impl mosaic_engine::BlockTune for PassTune {
        fn wrap(&mut self, dom: &mut Dom, content: NodeId) -> anyhow::Result<NodeId> {
            let wrapper = dom.create_element("div");
            dom.append_child(wrapper, content);
            Ok(wrapper)
        }
    }
    TuneDescriptor::new(name, |_settings, _data, _api| {
        Ok(Box::new(PassTune) as Box<dyn mosaic_engine::BlockTune>)
    })
}

fn bench_block_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("block");
    group.sample_size(10);

    group.bench_function("construct_and_compose", |b| {
        let descriptor = bench_descriptor().with_tune(wrapper_tune("alignment"));
        let default_tunes = vec![wrapper_tune("delete")];
        b.iter(|| {
            let scheduler = Scheduler::new_shared();
            let dom = Dom::new_shared(&scheduler);
            let options = BlockOptions {
                data: json!({"text": "hello world"}),
                ..BlockOptions::default()
            };
            let block =
                Block::new(options, &descriptor, &default_tunes, &dom, &scheduler).unwrap();
            std::hint::black_box(block);
        });
    });

    group.bench_function("mutation_pipeline", |b| {
        let scheduler = Scheduler::new_shared();
        let dom = Dom::new_shared(&scheduler);
        let descriptor = bench_descriptor();
        let options = BlockOptions {
            data: json!({"text": "hello world"}),
            ..BlockOptions::default()
        };
        let block = Block::new(options, &descriptor, &[], &dom, &scheduler).unwrap();
        let editable = block.inputs()[0];
        let text = dom.borrow().children(editable)[0];

        b.iter(|| {
            dom.borrow_mut().set_text(text, std::hint::black_box("edited"));
            Scheduler::advance(&scheduler, MUTATION_DEBOUNCE_TICKS);
            std::hint::black_box(block.input_count());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_block_operations);
criterion_main!(benches);
